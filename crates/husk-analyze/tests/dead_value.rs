//! End-to-end tests exercising [`analyze_program`] through its public
//! surface: one program built by hand (mirroring spec's own worked
//! examples, same as the inline tests in `lib.rs`) and one loaded from a
//! JSON artifact the way a real caller actually gets its input.

use husk_analyze::{analyze_program, Config};
use husk_core::{
    merge_artifacts, parse_artifact, CompilationUnit, ExprKind, Id, Interner, ModuleName, Pattern, SourceLoc, Span,
    TExpr, TopBinding,
};
use indoc::indoc;

fn at(n: u32) -> SourceLoc {
    SourceLoc { file: "t.ml".to_string(), span: Span::new(n, n + 1) }
}

/// `let x = 1 in let y = 2 in x` -> dead binding `y` and dead expression
/// `2`, both at the inner `let`'s value. Snapshotting the formatted stream
/// (rather than asserting on individual fields) pins down the warning
/// stream's shape along with the scenario itself.
#[test]
fn nested_let_snapshot() {
    let mut interner = Interner::new();
    let module = ModuleName(interner.intern("m"));
    let id_main = Id::new(module, 0);
    let id_x = Id::new(module, 1);
    let id_y = Id::new(module, 2);

    let inner = TExpr::new(
        at(20),
        ExprKind::Let {
            pat: Pattern::Var(id_y),
            value: Box::new(TExpr::new(at(10), ExprKind::Const)),
            body: Box::new(TExpr::new(at(15), ExprKind::Var(Some(id_x)))),
        },
    );
    let outer = TExpr::new(
        at(0),
        ExprKind::Let {
            pat: Pattern::Var(id_x),
            value: Box::new(TExpr::new(at(1), ExprKind::Const)),
            body: Box::new(inner),
        },
    );

    let unit = CompilationUnit {
        name: module,
        bindings: vec![TopBinding {
            recursive: false,
            name: Some(interner.intern("main")),
            pat: Pattern::Var(id_main),
            value: outer,
        }],
        signature: None,
        label: husk_core::Label::default(),
    };

    let mut warnings = analyze_program(vec![unit], interner, &Config::default()).expect("analysis succeeds");
    warnings.sort_by(|a, b| format!("{:?}", a.kind).cmp(&format!("{:?}", b.kind)));
    let summary = warnings
        .iter()
        .map(|w| format!("{:?} {}:{}..{} {}", w.kind, w.file, w.span.start, w.span.end, w.message))
        .collect::<Vec<_>>()
        .join("\n");

    insta::assert_snapshot!(summary, @r"
    DeadBinding t.ml:10..11 this binding is never used
    DeadExpression t.ml:10..11 this expression's value is never used
    ");
}

/// Same tuple-destructuring scenario as `lib.rs`'s own
/// `dead_tuple_slot_not_whole_tuple`, but driven through the artifact
/// loading path a host compiler actually uses: JSON text in, merged
/// units and a shared interner out.
#[test]
fn json_artifact_tuple_slot_end_to_end() {
    let json = indoc! {r#"
        {
          "unit": {
            "name": 0,
            "bindings": [
              {
                "recursive": false,
                "name": 1,
                "pat": {"Var": {"module": 0, "stamp": 0}},
                "value": {
                  "loc": {"file": "t.ml", "span": {"start": 0, "end": 1}},
                  "kind": {
                    "Let": {
                      "pat": {"Var": {"module": 0, "stamp": 1}},
                      "value": {
                        "loc": {"file": "t.ml", "span": {"start": 10, "end": 11}},
                        "kind": {
                          "Tuple": [
                            {"loc": {"file": "t.ml", "span": {"start": 11, "end": 12}}, "kind": "Const"},
                            {"loc": {"file": "t.ml", "span": {"start": 12, "end": 13}}, "kind": "Const"}
                          ]
                        }
                      },
                      "body": {
                        "loc": {"file": "t.ml", "span": {"start": 20, "end": 21}},
                        "kind": {
                          "Let": {
                            "pat": {"Tuple": [{"Var": {"module": 0, "stamp": 2}}, "Wildcard"]},
                            "value": {
                              "loc": {"file": "t.ml", "span": {"start": 21, "end": 22}},
                              "kind": {"Var": {"module": 0, "stamp": 1}}
                            },
                            "body": {
                              "loc": {"file": "t.ml", "span": {"start": 22, "end": 23}},
                              "kind": {"Var": {"module": 0, "stamp": 2}}
                            }
                          }
                        }
                      }
                    }
                  }
                }
              }
            ],
            "signature": null
          },
          "strings": ["m", "main"]
        }
    "#};

    let artifact = parse_artifact(json).expect("fixture parses");
    let (units, interner) = merge_artifacts(vec![artifact]);
    let warnings = analyze_program(units, interner, &Config::default()).expect("analysis succeeds");

    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert_eq!(warnings[0].file, "t.ml");
    assert_eq!(warnings[0].span, Span::new(12, 13));
}
