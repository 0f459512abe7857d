// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The production package manifest.

use serde_json::json;

use crate::error::Result;
use crate::output::{Artifact, OutputContext, OutputGenerator};

/// Emits `package.json` for packed builds: runtime dependencies, the
/// server entry as main, and a production start command.
pub struct PackageJsonOutput;

impl OutputGenerator for PackageJsonOutput {
    fn name(&self) -> &str {
        "package-json"
    }

    fn generate(&self, ctx: &OutputContext) -> Result<Vec<Artifact>> {
        if !ctx.production {
            return Ok(Vec::new());
        }

        let mut pkg = json!({
            "private": true,
            "main": "server.js",
            "scripts": {
                "start": "NODE_ENV=production node server.js"
            },
            "dependencies": ctx.manifest.dependencies,
        });

        if let Some(name) = &ctx.manifest.name {
            pkg["name"] = json!(name);
        }
        if let Some(version) = &ctx.manifest.version {
            pkg["version"] = json!(version);
        }

        let mut content = serde_json::to_vec_pretty(&pkg)?;
        content.push(b'\n');
        Ok(vec![Artifact {
            path: "package.json".to_string(),
            content,
        }])
    }
}
