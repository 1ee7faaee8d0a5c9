//! `//kage:` compiler directives.

use kage_ir::Unit;

use crate::CompileError;

const UNIT_DIRECTIVE: &str = "//kage:unit";

fn is_package_clause(line: &str) -> bool {
    line.strip_prefix("package")
        .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
}

/// Reads the `//kage:unit` directive.
///
/// The directive must sit on its own line before the package clause and
/// may appear at most once. Without it the unit is [`Unit::Texels`].
pub fn parse_directives(source: &str) -> Result<Unit, CompileError> {
    let mut unit = None;
    let mut after_package = false;

    for line in source.lines() {
        let line = line.trim();
        if is_package_clause(line) {
            after_package = true;
            continue;
        }
        let Some(rest) = line.strip_prefix(UNIT_DIRECTIVE) else {
            continue;
        };
        if !rest.starts_with(char::is_whitespace) {
            continue;
        }
        if after_package {
            return Err(CompileError::Directive(
                "shader: //kage:unit must be placed before the package clause".into(),
            ));
        }
        if unit.is_some() {
            return Err(CompileError::Directive(
                "shader: at most one //kage:unit can exist in a shader".into(),
            ));
        }
        unit = Some(match rest.trim() {
            "pixels" => Unit::Pixels,
            "texels" => Unit::Texels,
            value => {
                return Err(CompileError::Directive(format!(
                    "shader: invalid value for //kage:unit: {value}"
                )));
            }
        });
    }

    let unit = unit.unwrap_or_default();
    log::debug!("unit directive resolved to {unit}");
    Ok(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_texels() {
        assert_eq!(parse_directives("package main\n").unwrap(), Unit::Texels);
    }

    #[test]
    fn pixels() {
        let src = "//kage:unit pixels\n\npackage main\n";
        assert_eq!(parse_directives(src).unwrap(), Unit::Pixels);
    }

    #[test]
    fn leading_whitespace_is_allowed() {
        let src = "\n  //kage:unit texels  \npackage main\n";
        assert_eq!(parse_directives(src).unwrap(), Unit::Texels);
    }

    #[test]
    fn duplicate() {
        let src = "//kage:unit pixels\n//kage:unit pixels\npackage main\n";
        let err = parse_directives(src).unwrap_err();
        assert!(err.to_string().contains("at most one"));
    }

    #[test]
    fn invalid_value() {
        let err = parse_directives("//kage:unit meters\npackage main\n").unwrap_err();
        assert_eq!(err.to_string(), "shader: invalid value for //kage:unit: meters");
    }

    #[test]
    fn after_package_clause() {
        let err = parse_directives("package main\n//kage:unit pixels\n").unwrap_err();
        assert!(err.to_string().contains("before the package clause"));
    }

    #[test]
    fn similar_comments_are_ignored() {
        let src = "//kage:units pixels\n// kage:unit pixels\npackage main\n";
        assert_eq!(parse_directives(src).unwrap(), Unit::Texels);
    }
}
