//! In-process pipeline stages.
//!
//! A stage written as `@code` is not spawned; its code and the text produced
//! by the previous stage are handed to a [`ScriptEvaluator`]. A failing
//! evaluation is treated exactly like a process exiting non-zero.

use std::collections::BTreeSet;

use super::executor::ExecutionResult;

pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, code: &str, input: &str) -> ExecutionResult;
}

/// A handful of line-oriented text transforms, enough to make `@` stages
/// useful from the interactive shell.
pub struct TextTransforms;

impl ScriptEvaluator for TextTransforms {
    fn evaluate(&self, code: &str, input: &str) -> ExecutionResult {
        let lines = input.lines();
        let output = match code.trim() {
            "upper" => input.to_uppercase(),
            "lower" => input.to_lowercase(),
            "trim" => lines.map(str::trim).map(|l| format!("{}\n", l)).collect(),
            "rev" => lines
                .map(|l| format!("{}\n", l.chars().rev().collect::<String>()))
                .collect(),
            "count" => format!("{}\n", lines.count()),
            "sort" => {
                let mut sorted: Vec<&str> = lines.collect();
                sorted.sort_unstable();
                sorted.iter().map(|l| format!("{}\n", l)).collect()
            }
            "uniq" => {
                let mut seen = BTreeSet::new();
                lines
                    .filter(|l| seen.insert(*l))
                    .map(|l| format!("{}\n", l))
                    .collect()
            }
            other => {
                return ExecutionResult::failure(1, format!("tide: unknown transform: {}", other))
            }
        };
        ExecutionResult::success(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transforms() {
        let t = TextTransforms;
        assert_eq!(t.evaluate("upper", "ab\n").stdout, "AB\n");
        assert_eq!(t.evaluate("count", "a\nb\nc\n").stdout, "3\n");
        assert_eq!(t.evaluate("sort", "b\na\n").stdout, "a\nb\n");
        assert_eq!(t.evaluate("uniq", "a\nb\na\n").stdout, "a\nb\n");
        assert_eq!(t.evaluate("rev", "abc\n").stdout, "cba\n");
    }

    #[test]
    fn test_unknown_transform_fails() {
        let result = TextTransforms.evaluate("explode", "x");
        assert!(!result.ok());
        assert!(result.stderr.contains("explode"));
    }
}
