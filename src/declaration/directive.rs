//! Comment directives attached to declarations and patch references.
//!
//! Two markers are recognized:
//!
//! - `# releaser:upgrade-dep <org> <repo> [subpath]` above a declaration
//!   marks it upgradeable and names the upstream repository.
//! - `# releaser:patch-cmd <argv...>` above a patch reference makes the
//!   regenerator run that command instead of applying the old patch.

use crate::constants::{PATCH_COMMAND_DIRECTIVE, UPGRADE_DIRECTIVE};
use crate::core::DepbumpError;

/// Upstream coordinates parsed from an upgrade directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeDirective {
    pub org: String,
    pub repo: String,
    /// Subdirectory of the repository the declaration points at; tags for
    /// such modules are prefixed with `<subpath>/`.
    pub subpath: Option<String>,
}

/// Extracts the comment block directly above an item from its decor prefix,
/// without the leading `#`.
///
/// Only the contiguous run of comment lines ending at the item counts; a
/// blank line or any other text above it ends the block. Indentation that
/// precedes the item on its own line is ignored.
#[must_use]
pub fn comment_lines(prefix: &str) -> Vec<String> {
    let mut lines: Vec<&str> = prefix.lines().collect();
    if !prefix.ends_with('\n') {
        // The last segment is the item's own indentation.
        lines.pop();
    }

    let mut block: Vec<String> = lines
        .iter()
        .rev()
        .map(|line| line.trim_start())
        .map_while(|line| line.strip_prefix('#'))
        .map(|line| line.trim_end().to_string())
        .collect();
    block.reverse();
    block
}

/// Finds and parses the upgrade directive in a comment block.
///
/// The first comment whose first word is the marker wins; it must carry
/// exactly org and repo, plus an optional subpath.
///
/// # Errors
///
/// - [`DepbumpError::DirectiveNotFound`] when no comment carries the marker
/// - [`DepbumpError::InvalidDirective`] when the marker has the wrong number of fields
///
/// # Examples
///
/// ```rust
/// use depbump::declaration::directive::parse_upgrade_directive;
///
/// let comments = vec![" releaser:upgrade-dep golang tools gopls".to_string()];
/// let directive = parse_upgrade_directive(&comments).unwrap();
/// assert_eq!(directive.org, "golang");
/// assert_eq!(directive.subpath.as_deref(), Some("gopls"));
/// ```
pub fn parse_upgrade_directive(comments: &[String]) -> Result<UpgradeDirective, DepbumpError> {
    for comment in comments {
        let words: Vec<&str> = comment.split_whitespace().collect();
        if words.first() != Some(&UPGRADE_DIRECTIVE) {
            continue;
        }
        return match words.as_slice() {
            [_, org, repo] => Ok(UpgradeDirective {
                org: (*org).to_string(),
                repo: (*repo).to_string(),
                subpath: None,
            }),
            [_, org, repo, subpath] => Ok(UpgradeDirective {
                org: (*org).to_string(),
                repo: (*repo).to_string(),
                subpath: Some((*subpath).to_string()),
            }),
            _ => Err(DepbumpError::InvalidDirective {
                directive: comment.trim().to_string(),
            }),
        };
    }
    Err(DepbumpError::DirectiveNotFound)
}

/// Returns the regeneration command attached to a patch reference, if any.
///
/// A marker with no command after it counts as no directive.
#[must_use]
pub fn parse_patch_command(comments: &[String]) -> Option<Vec<String>> {
    comments.iter().find_map(|comment| {
        let mut words = comment.split_whitespace();
        if words.next() != Some(PATCH_COMMAND_DIRECTIVE) {
            return None;
        }
        let argv: Vec<String> = words.map(String::from).collect();
        (!argv.is_empty()).then_some(argv)
    })
}
