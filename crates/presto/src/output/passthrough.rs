// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Verbatim copies of unclassified files.

use crate::error::Result;
use crate::file::FileType;
use crate::output::{Artifact, OutputContext, OutputGenerator};

/// In production, copies files no classifier claimed (or that ended up
/// with no targets) so custom assets survive packaging.
pub struct PassthroughOutput;

impl OutputGenerator for PassthroughOutput {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn generate(&self, ctx: &OutputContext) -> Result<Vec<Artifact>> {
        if !ctx.production {
            return Ok(Vec::new());
        }

        Ok(ctx
            .files
            .iter()
            .filter(|f| f.file_type() == FileType::Unclassified || f.targets().is_empty())
            // the generated manifest owns this path
            .filter(|f| f.path() != "package.json")
            .map(|f| Artifact::text(f.path(), f.content().unwrap_or("")))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::Target;
    use crate::output::test_support::context;

    #[test]
    fn test_only_runs_in_production() {
        let ctx = context(
            vec![("notes.md", FileType::Unclassified, vec![], "hi")],
            false,
        );
        assert!(PassthroughOutput.generate(&ctx).unwrap().is_empty());
    }

    #[test]
    fn test_copies_unclassified_files_verbatim() {
        let ctx = context(
            vec![
                ("notes.md", FileType::Unclassified, vec![], "hi"),
                ("main.js", FileType::Script, vec![Target::Client], "var x;"),
            ],
            true,
        );
        let artifacts = PassthroughOutput.generate(&ctx).unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path, "notes.md");
        assert_eq!(artifacts[0].content, b"hi");
    }
}
