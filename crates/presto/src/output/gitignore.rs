// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Version-control ignore file for the build directory.

use crate::error::Result;
use crate::output::{Artifact, OutputContext, OutputGenerator};

const GITIGNORE: &str = "# generated by presto\n\n*\n!.gitignore\n!package.json\n";

/// Keeps the build directory out of version control in development.
pub struct GitignoreOutput;

impl OutputGenerator for GitignoreOutput {
    fn name(&self) -> &str {
        "gitignore"
    }

    fn generate(&self, ctx: &OutputContext) -> Result<Vec<Artifact>> {
        if ctx.production {
            return Ok(Vec::new());
        }
        Ok(vec![Artifact::text(".gitignore", GITIGNORE)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_support::context;

    #[test]
    fn test_emitted_in_development_only() {
        let dev = context(vec![], false);
        let artifacts = GitignoreOutput.generate(&dev).unwrap();
        assert_eq!(artifacts[0].path, ".gitignore");
        assert!(String::from_utf8(artifacts[0].content.clone())
            .unwrap()
            .contains("!.gitignore"));

        let prod = context(vec![], true);
        assert!(GitignoreOutput.generate(&prod).unwrap().is_empty());
    }
}
