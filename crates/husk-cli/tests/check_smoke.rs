//! Smoke test for `husk check`: feeds a JSON compilation-unit fixture with
//! one known-dead expression through the compiled binary and checks its
//! exit code and stderr.

use std::io::Write as _;
use std::process::Command;

const FIXTURE: &str = r#"{
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
}"#;

/// `husk check` against a fixture with exactly one dead tuple slot: exits
/// successfully (warnings are informational only) and reports the dead
/// range on stderr. The fixture's `file` field ("t.ml") doesn't resolve to
/// an actual file on disk, so the CLI falls back to its plain-text
/// renderer — deterministic output, independent of the source-excerpt
/// path `annotate-snippets` draws when a real file is found.
#[test]
fn check_reports_dead_tuple_slot_and_exits_zero() {
    let mut fixture = tempfile::Builder::new().suffix(".json").tempfile().expect("create temp fixture");
    fixture.write_all(FIXTURE.as_bytes()).expect("write fixture");

    let output = Command::new(env!("CARGO_BIN_EXE_husk"))
        .arg("check")
        .arg(fixture.path())
        .output()
        .expect("run husk check");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stderr = String::from_utf8_lossy(&output.stderr);
    insta::assert_snapshot!(stderr.trim(), @"warning at 12..13: this expression's value is never used");
}
