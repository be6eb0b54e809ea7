//! Tracking of source positions for parsed programs.
use std::sync::{Mutex, OnceLock};

/// Handle to a position in a [PositionTable].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PosIdx(u32);

/// Handle to a file in a [PositionTable].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct FileIdx(u32);

/// A source program file.
struct File {
    name: String,
    source: String,
}

struct PosData {
    file: FileIdx,
    start: usize,
}

/// Source position information for a set of parsed files.
pub struct PositionTable {
    files: Vec<File>,
    indices: Vec<PosData>,
}

impl Default for PositionTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionTable {
    /// The unknown position.
    pub const UNKNOWN: PosIdx = PosIdx(0);

    /// Create a new position table where the first file and first position
    /// are unknown.
    pub fn new() -> Self {
        let mut table = PositionTable {
            files: Vec::new(),
            indices: Vec::new(),
        };
        table.add_file("unknown".to_string(), "".to_string());
        let pos = table.add_pos(FileIdx(0), 0);
        debug_assert!(pos == Self::UNKNOWN);
        table
    }

    /// Add a new file to the position table.
    pub fn add_file(&mut self, name: String, source: String) -> FileIdx {
        let file_idx = self.files.len();
        self.files.push(File { name, source });
        FileIdx(file_idx as u32)
    }

    /// Add a new position to the position table.
    pub fn add_pos(&mut self, file: FileIdx, start: usize) -> PosIdx {
        let pos_idx = self.indices.len();
        self.indices.push(PosData { file, start });
        PosIdx(pos_idx as u32)
    }

    /// The file name and 1-based line number of a position.
    pub fn line_info(&self, pos: PosIdx) -> (String, usize) {
        let data = &self.indices[pos.0 as usize];
        let file = &self.files[data.file.0 as usize];
        let line = file.source[..data.start.min(file.source.len())]
            .bytes()
            .filter(|b| *b == b'\n')
            .count()
            + 1;
        (file.name.clone(), line)
    }
}

/// The global position table, shared by every parse in the process.
pub struct GlobalPositionTable;

impl GlobalPositionTable {
    fn table() -> &'static Mutex<PositionTable> {
        static TABLE: OnceLock<Mutex<PositionTable>> = OnceLock::new();
        TABLE.get_or_init(|| Mutex::new(PositionTable::new()))
    }

    /// Register a file and its source text.
    pub fn add_file(name: String, source: String) -> FileIdx {
        Self::table().lock().unwrap().add_file(name, source)
    }

    /// Register a position inside a previously registered file.
    pub fn add_pos(file: FileIdx, start: usize) -> PosIdx {
        Self::table().lock().unwrap().add_pos(file, start)
    }

    /// The file name and 1-based line of a position.
    pub fn line_info(pos: PosIdx) -> (String, usize) {
        Self::table().lock().unwrap().line_info(pos)
    }
}

/// A position index backed by the global position table.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GPosIdx(pub PosIdx);

impl GPosIdx {
    /// The unknown position.
    pub const UNKNOWN: GPosIdx = GPosIdx(PositionTable::UNKNOWN);

    /// Format this position as `file:line`, or `None` for the unknown
    /// position.
    pub fn show(&self) -> Option<String> {
        if *self == Self::UNKNOWN {
            return None;
        }
        let (file, line) = GlobalPositionTable::line_info(self.0);
        Some(format!("{file}:{line}"))
    }
}

/// Things that carry a source position.
pub trait WithPos {
    /// Copy the span associated with this node.
    fn copy_span(&self) -> GPosIdx;
}
