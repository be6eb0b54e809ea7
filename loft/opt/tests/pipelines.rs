//! End-to-end checks: parse a routine, transform it through the registry,
//! and run both versions through a small interpreter to compare observable
//! behavior instead of output text.
use indoc::indoc;
use loft_opt::{default_registry, Options, OptValue, TransformStep};
use loft_ir::{
    parse_source, BinOp, Dialect, Intrinsic, NodeId, NodeKind, ScalarKind,
    Tree, UnOp,
};
use std::collections::HashMap;
use std::str::FromStr;

// ------------------------- a tiny interpreter --------------------------
//
// Just enough to execute the routines the tests build: scalars and
// one-dimensional arrays, all carried as f64. Loop bounds are rounded to
// integers; comparisons yield 1.0 or 0.0.

#[derive(Clone, Debug, PartialEq)]
enum Val {
    Num(f64),
    Arr(Vec<f64>),
}

#[derive(Clone, Default)]
struct Machine {
    vars: HashMap<String, Val>,
}

impl Machine {
    fn set(mut self, name: &str, v: f64) -> Self {
        self.vars.insert(name.to_string(), Val::Num(v));
        self
    }

    fn array(mut self, name: &str, v: Vec<f64>) -> Self {
        self.vars.insert(name.to_string(), Val::Arr(v));
        self
    }

    fn num(&self, name: &str) -> f64 {
        match &self.vars[name] {
            Val::Num(v) => *v,
            Val::Arr(_) => panic!("{name} is an array"),
        }
    }

    fn arr(&self, name: &str) -> &[f64] {
        match &self.vars[name] {
            Val::Arr(v) => v,
            Val::Num(_) => panic!("{name} is a scalar"),
        }
    }

    fn run(&mut self, tree: &Tree, node: NodeId) {
        match &tree.get(node).kind {
            NodeKind::FileContainer { .. }
            | NodeKind::Container { .. }
            | NodeKind::Routine { .. }
            | NodeKind::Schedule { .. }
            | NodeKind::ExtractRegion { .. } => {
                for child in tree.children(node).to_vec() {
                    self.run(tree, child);
                }
            }
            NodeKind::Assignment => {
                let lhs = tree.children(node)[0];
                let value = self.eval(tree, tree.children(node)[1]);
                match &tree.get(lhs).kind {
                    NodeKind::Reference { symbol } => {
                        let name = tree.symbol(*symbol).name.to_string();
                        self.vars.insert(name, Val::Num(value));
                    }
                    NodeKind::ArrayRef { symbol } => {
                        let idx =
                            self.eval(tree, tree.children(lhs)[0]) as usize;
                        let name = tree.symbol(*symbol).name.to_string();
                        match self.vars.get_mut(&name) {
                            Some(Val::Arr(v)) => v[idx - 1] = value,
                            _ => panic!("{name} is not an array"),
                        }
                    }
                    kind => panic!("cannot assign to {}", kind.tag()),
                }
            }
            NodeKind::Loop { variable } => {
                let name = tree.symbol(*variable).name.to_string();
                let (start, stop, step, body) =
                    tree.loop_parts(node).expect("well-formed loop");
                let start = self.eval(tree, start).round() as i64;
                let stop = self.eval(tree, stop).round() as i64;
                let step = self.eval(tree, step).round() as i64;
                assert_ne!(step, 0, "zero loop step");
                let mut i = start;
                while (step > 0 && i <= stop) || (step < 0 && i >= stop) {
                    self.vars.insert(name.clone(), Val::Num(i as f64));
                    self.run(tree, body);
                    i += step;
                }
            }
            NodeKind::IfBlock => {
                let children = tree.children(node).to_vec();
                if self.eval(tree, children[0]) != 0.0 {
                    self.run(tree, children[1]);
                } else if let Some(other) = children.get(2) {
                    self.run(tree, *other);
                }
            }
            kind => panic!("cannot execute {}", kind.tag()),
        }
    }

    fn eval(&self, tree: &Tree, node: NodeId) -> f64 {
        match &tree.get(node).kind {
            NodeKind::Literal { value, ty } => match ty {
                ScalarKind::Boolean => (value.as_str() == "true") as u8 as f64,
                _ => value.as_str().parse().expect("numeric literal"),
            },
            NodeKind::Reference { symbol } => {
                self.num(tree.symbol(*symbol).name.as_str())
            }
            NodeKind::ArrayRef { symbol } => {
                let idx = self.eval(tree, tree.children(node)[0]) as usize;
                self.arr(tree.symbol(*symbol).name.as_str())[idx - 1]
            }
            NodeKind::UnaryOp(op) => {
                let x = self.eval(tree, tree.children(node)[0]);
                match op {
                    UnOp::Minus => -x,
                    UnOp::Not => (x == 0.0) as u8 as f64,
                }
            }
            NodeKind::BinaryOp(op) => {
                let a = self.eval(tree, tree.children(node)[0]);
                let b = self.eval(tree, tree.children(node)[1]);
                match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    BinOp::Pow => a.powf(b),
                    BinOp::Eq => (a == b) as u8 as f64,
                    BinOp::Ne => (a != b) as u8 as f64,
                    BinOp::Lt => (a < b) as u8 as f64,
                    BinOp::Le => (a <= b) as u8 as f64,
                    BinOp::Gt => (a > b) as u8 as f64,
                    BinOp::Ge => (a >= b) as u8 as f64,
                    BinOp::And => (a != 0.0 && b != 0.0) as u8 as f64,
                    BinOp::Or => (a != 0.0 || b != 0.0) as u8 as f64,
                }
            }
            NodeKind::IntrinsicCall(intr) => {
                let args: Vec<f64> = tree
                    .children(node)
                    .iter()
                    .map(|a| self.eval(tree, *a))
                    .collect();
                match intr {
                    Intrinsic::Abs => args[0].abs(),
                    Intrinsic::Sign => args[0].abs() * b_sign(args[1]),
                    Intrinsic::Min => {
                        args.iter().copied().fold(f64::INFINITY, f64::min)
                    }
                    Intrinsic::Max => {
                        args.iter().copied().fold(f64::NEG_INFINITY, f64::max)
                    }
                    Intrinsic::Sum => args[0],
                }
            }
            kind => panic!("cannot evaluate {}", kind.tag()),
        }
    }
}

fn b_sign(x: f64) -> f64 {
    if x < 0.0 {
        -1.0
    } else {
        1.0
    }
}

// ----------------------------- helpers ---------------------------------

fn parsed(src: &str) -> Tree {
    parse_source(src, "test", &Dialect::default()).expect("fixture parses")
}

fn find(tree: &Tree, pred: impl Fn(&NodeKind) -> bool) -> NodeId {
    tree.walk(tree.root())
        .into_iter()
        .find(|n| pred(&tree.get(*n).kind))
        .expect("fixture contains the target node")
}

fn outermost_loop(tree: &Tree) -> NodeId {
    find(tree, |k| matches!(k, NodeKind::Loop { .. }))
}

fn run_routine(tree: &Tree, input: Machine) -> Machine {
    let mut machine = input;
    machine.run(tree, tree.root());
    machine
}

// ------------------------------- tests ---------------------------------

#[test]
fn blocking_visits_every_index_once_in_order() {
    let src = indoc! {"
        subroutine sweep(a, n)
        real, intent(inout), dimension(n) :: a
        integer, intent(in) :: n
        real :: c
        integer :: i
        c = 0.0
        do i = 1, n
          a(i) = a(i) + i
          c = c * 100.0 + i
        end do
        end subroutine sweep
    "};
    let before = parsed(src);
    let mut after = parsed(src);
    let target = outermost_loop(&after);
    // 10 is deliberately not a multiple of the block size.
    default_registry()
        .apply(
            "block-loop",
            &mut after,
            &[target],
            &Options::new().with("blocksize", OptValue::Int(4)),
        )
        .unwrap();

    let input = Machine::default().set("n", 10.0).array("a", vec![0.0; 10]);
    let expected = run_routine(&before, input.clone());
    let got = run_routine(&after, input);

    // Each element incremented exactly once, in the original order.
    assert_eq!(got.arr("a"), expected.arr("a"));
    assert_eq!(got.num("c"), expected.num("c"));
    assert_eq!(got.arr("a")[6], 7.0);
}

#[test]
fn blocking_a_downward_loop_preserves_order() {
    let src = indoc! {"
        subroutine sweep(a, n)
        real, intent(inout), dimension(n) :: a
        integer, intent(in) :: n
        real :: c
        integer :: i
        c = 0.0
        do i = n, 1, -1
          a(i) = a(i) + 1.0
          c = c * 100.0 + i
        end do
        end subroutine sweep
    "};
    let before = parsed(src);
    let mut after = parsed(src);
    let target = outermost_loop(&after);
    default_registry()
        .apply(
            "block-loop",
            &mut after,
            &[target],
            &Options::new().with("blocksize", OptValue::Int(3)),
        )
        .unwrap();

    let input = Machine::default().set("n", 7.0).array("a", vec![0.0; 7]);
    let expected = run_routine(&before, input.clone());
    let got = run_routine(&after, input);
    assert_eq!(got.arr("a"), expected.arr("a"));
    assert_eq!(got.num("c"), expected.num("c"));
}

#[test]
fn tiling_covers_the_plane_exactly_once() {
    // The 10x10 plane is flattened into a(100); after tiling with a tile
    // size the extents do not divide, every cell must still be written
    // exactly once.
    let src = indoc! {"
        subroutine sweep(a, n, m)
        real, intent(inout), dimension(100) :: a
        integer, intent(in) :: n
        integer, intent(in) :: m
        integer :: i
        integer :: j
        do i = 1, n
          do j = 1, m
            a((i - 1) * m + j) = a((i - 1) * m + j) + 1.0
          end do
        end do
        end subroutine sweep
    "};
    let mut after = parsed(src);
    let target = outermost_loop(&after);
    default_registry()
        .apply(
            "loop-tiling-2d",
            &mut after,
            &[target],
            &Options::new().with("tilesize", OptValue::Int(4)),
        )
        .unwrap();

    let input = Machine::default()
        .set("n", 10.0)
        .set("m", 10.0)
        .array("a", vec![0.0; 100]);
    let got = run_routine(&after, input);
    assert!(got.arr("a").iter().all(|v| *v == 1.0));
}

#[test]
fn intrinsic_lowerings_preserve_values() {
    let src = indoc! {"
        subroutine kernels(x, y, p, q, s, r1, r2, r3)
        real, intent(in) :: x
        real, intent(in) :: y
        real, intent(in) :: p
        real, intent(in) :: q
        real, intent(in) :: s
        real, intent(out) :: r1
        real, intent(out) :: r2
        real, intent(out) :: r3
        r1 = abs(x)
        r2 = sign(x, y)
        r3 = min(p, q, s)
        end subroutine kernels
    "};
    let before = parsed(src);
    let mut after = parsed(src);
    let registry = default_registry();
    for (name, intr) in [
        ("abs-to-code", Intrinsic::Abs),
        ("sign-to-code", Intrinsic::Sign),
        ("min-to-code", Intrinsic::Min),
    ] {
        let target = find(&after, |k| {
            matches!(k, NodeKind::IntrinsicCall(i) if *i == intr)
        });
        registry
            .apply(name, &mut after, &[target], &Options::new())
            .unwrap();
    }
    assert!(!after
        .walk(after.root())
        .iter()
        .any(|n| matches!(after.get(*n).kind, NodeKind::IntrinsicCall(_))));

    for (x, y, p, q, s) in [
        (-3.5, 2.0, 1.0, -2.0, 0.5),
        (2.0, -1.0, 9.0, 9.0, 9.0),
        (0.0, -4.0, -1.0, -5.0, 3.0),
    ] {
        let input = Machine::default()
            .set("x", x)
            .set("y", y)
            .set("p", p)
            .set("q", q)
            .set("s", s);
        let expected = run_routine(&before, input.clone());
        let got = run_routine(&after, input);
        for r in ["r1", "r2", "r3"] {
            assert_eq!(got.num(r), expected.num(r), "{r} for x={x} y={y}");
        }
    }
}

#[test]
fn sum_lowering_accumulates_the_array() {
    let src = indoc! {"
        subroutine total(a, n, r)
        real, intent(in), dimension(n) :: a
        integer, intent(in) :: n
        real, intent(out) :: r
        r = sum(a)
        end subroutine total
    "};
    let mut after = parsed(src);
    let target = find(&after, |k| {
        matches!(k, NodeKind::IntrinsicCall(Intrinsic::Sum))
    });
    default_registry()
        .apply("sum-to-code", &mut after, &[target], &Options::new())
        .unwrap();
    assert!(!after
        .walk(after.root())
        .iter()
        .any(|n| matches!(after.get(*n).kind, NodeKind::IntrinsicCall(_))));

    let input = Machine::default()
        .set("n", 4.0)
        .array("a", vec![1.5, -0.5, 2.0, 4.0]);
    let got = run_routine(&after, input);
    assert_eq!(got.num("r"), 7.0);
}

#[test]
fn script_steps_drive_the_registry() {
    let src = indoc! {"
        subroutine sweep(a, n)
        real, intent(inout), dimension(n) :: a
        integer, intent(in) :: n
        integer :: i
        do i = 1, n
          a(i) = a(i) * 2.0
        end do
        end subroutine sweep
    "};
    let step = TransformStep::from_str("block-loop:blocksize=8").unwrap();
    let registry = default_registry();
    let mut tree = parsed(src);

    // The driver applies a step to the first node it validates on.
    let target = tree
        .walk(tree.root())
        .into_iter()
        .find(|n| {
            registry
                .validate(&step.name, &tree, &[*n], &step.options)
                .is_ok()
        })
        .expect("some node accepts the step");
    registry
        .apply(&step.name, &mut tree, &[target], &step.options)
        .unwrap();

    let input = Machine::default().set("n", 20.0).array("a", vec![1.0; 20]);
    let got = run_routine(&tree, input);
    assert!(got.arr("a").iter().all(|v| *v == 2.0));
}

#[test]
fn extraction_keeps_behavior_and_reports_dataflow() {
    let src = indoc! {"
        subroutine sweep(a, b, n)
        real, intent(inout), dimension(n) :: a
        real, intent(in), dimension(n) :: b
        integer, intent(in) :: n
        integer :: i
        do i = 1, n
          a(i) = a(i) + b(i)
        end do
        end subroutine sweep
    "};
    let before = parsed(src);
    let mut after = parsed(src);
    let target = outermost_loop(&after);
    default_registry()
        .apply("extract-region", &mut after, &[target], &Options::new())
        .unwrap();

    let region = find(&after, |k| {
        matches!(k, NodeKind::ExtractRegion { .. })
    });
    let NodeKind::ExtractRegion {
        inputs, outputs, ..
    } = &after.get(region).kind
    else {
        unreachable!()
    };
    assert!(inputs.iter().any(|v| v.as_str() == "b"));
    assert!(outputs.iter().any(|v| v.as_str() == "a"));

    let input = Machine::default()
        .set("n", 4.0)
        .array("a", vec![1.0; 4])
        .array("b", vec![0.5, 1.5, 2.5, 3.5]);
    let expected = run_routine(&before, input.clone());
    let got = run_routine(&after, input);
    assert_eq!(got.arr("a"), expected.arr("a"));
}
