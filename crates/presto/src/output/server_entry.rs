// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The generated server bootstrap.
//!
//! `server.js` requires the declared runtime dependencies (and any
//! server-targeted virtual modules) first, then every server-targeted
//! script file in scan order. In development the requires point back
//! into the source tree; in production the server files are copied under
//! `server_build/` and required from there, so the packed artifact is
//! self-contained.

use crate::error::Result;
use crate::file::{FileType, Target};
use crate::output::{Artifact, OutputContext, OutputGenerator};

/// Emits `server.js` (and the `server_build/` tree in production).
pub struct ServerEntryOutput;

fn print_require(spec: &str) -> String {
    format!("require({});\n", serde_json::to_string(spec).unwrap_or_default())
}

impl OutputGenerator for ServerEntryOutput {
    fn name(&self) -> &str {
        "server-entry"
    }

    fn generate(&self, ctx: &OutputContext) -> Result<Vec<Artifact>> {
        let mut artifacts = Vec::new();
        let mut entry = String::from("// Packages\n");

        for dep in ctx.manifest.runtime_dependencies() {
            entry.push_str(&print_require(dep));
        }
        for module in ctx.modules_for(FileType::Script, Target::Server) {
            entry.push_str(&print_require(module.path()));
        }

        entry.push_str("\n// Internal Files\n");
        for file in ctx.files_for(FileType::Script, Target::Server) {
            if ctx.production {
                let out_path = format!("server_build/{}", file.path());
                entry.push_str(&print_require(&format!("./{}", out_path)));
                artifacts.push(Artifact::text(out_path, file.content().unwrap_or("")));
            } else {
                // server.js lives in the build dir, one level below the
                // source tree
                entry.push_str(&print_require(&format!("../{}", file.path())));
            }
        }

        artifacts.push(Artifact::text("server.js", entry));
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::File;
    use crate::output::test_support::context;

    #[test]
    fn test_dev_entry_orders_packages_then_files() {
        let mut ctx = context(
            vec![
                ("lib/api.js", FileType::Script, vec![Target::Server], "a"),
                ("main.js", FileType::Script, vec![Target::Client, Target::Server], "m"),
                ("client/app.js", FileType::Script, vec![Target::Client], "c"),
            ],
            false,
        );
        ctx.manifest
            .dependencies
            .insert("presto-runtime".to_string(), "~1.0.0".to_string());

        let artifacts = ServerEntryOutput.generate(&ctx).unwrap();
        assert_eq!(artifacts.len(), 1);
        let entry = String::from_utf8(artifacts[0].content.clone()).unwrap();

        let runtime = entry.find("require(\"presto-runtime\")").unwrap();
        let api = entry.find("require(\"../lib/api.js\")").unwrap();
        let main = entry.find("require(\"../main.js\")").unwrap();
        assert!(runtime < api && api < main);
        assert!(!entry.contains("client/app.js"));
    }

    #[test]
    fn test_server_virtual_modules_require_by_id() {
        let mut ctx = context(vec![], false);
        ctx.modules.push(File::module(
            "presto-runtime/server",
            FileType::Script,
            vec![Target::Server],
        ));
        let artifacts = ServerEntryOutput.generate(&ctx).unwrap();
        let entry = String::from_utf8(artifacts[0].content.clone()).unwrap();
        assert!(entry.contains("require(\"presto-runtime/server\")"));
    }

    #[test]
    fn test_production_copies_server_files() {
        let ctx = context(
            vec![("lib/api.js", FileType::Script, vec![Target::Server], "var a;")],
            true,
        );
        let artifacts = ServerEntryOutput.generate(&ctx).unwrap();

        let copy = artifacts
            .iter()
            .find(|a| a.path == "server_build/lib/api.js")
            .unwrap();
        assert_eq!(copy.content, b"var a;");

        let entry = artifacts.iter().find(|a| a.path == "server.js").unwrap();
        let entry = String::from_utf8(entry.content.clone()).unwrap();
        assert!(entry.contains("require(\"./server_build/lib/api.js\")"));
        assert!(!entry.contains("require(\"../lib/api.js\")"));
    }
}
