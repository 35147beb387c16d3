//! Script input and response output
//!
//! - Input: a JSON array of statements in a file
//! - Output: each response written verbatim to stdout

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::planner::Statement;

use super::errors::{CliError, CliResult};

/// Reads the statements of a script file
pub fn read_script(path: &Path) -> CliResult<Vec<Statement>> {
    let content = fs::read_to_string(path)
        .map_err(|e| CliError::io_error(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_script(&content)
}

pub fn parse_script(content: &str) -> CliResult<Vec<Statement>> {
    serde_json::from_str(content)
        .map_err(|e| CliError::script_error(format!("Invalid script: {}", e)))
}

/// Writes one statement response to `out`
pub fn write_response(out: &mut impl Write, response: &str) -> CliResult<()> {
    out.write_all(response.as_bytes())?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::errors::CliErrorCode;

    #[test]
    fn test_parse_script() {
        let statements = parse_script(
            r#"[{"statement": "show_tables"}, {"statement": "desc_table", "table": "t"}]"#,
        )
        .unwrap();
        assert_eq!(
            statements,
            vec![
                Statement::ShowTables,
                Statement::DescTable {
                    table: "t".to_string()
                }
            ]
        );
    }

    #[test]
    fn test_script_must_be_array() {
        let err = parse_script(r#"{"statement": "help"}"#).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ScriptError);
    }

    #[test]
    fn test_write_response_is_verbatim() {
        let mut out = Vec::new();
        write_response(&mut out, "SUCCESS\n").unwrap();
        assert_eq!(out, b"SUCCESS\n");
    }
}
