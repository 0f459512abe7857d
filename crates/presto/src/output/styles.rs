// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Concatenated client stylesheet.

use crate::error::Result;
use crate::file::{FileType, Target};
use crate::minify;
use crate::output::{Artifact, OutputContext, OutputGenerator};

/// Concatenates every client-targeted style file, in scan order, each
/// preceded by a banner naming its source path.
pub struct StylesOutput;

impl OutputGenerator for StylesOutput {
    fn name(&self) -> &str {
        "styles"
    }

    fn generate(&self, ctx: &OutputContext) -> Result<Vec<Artifact>> {
        let mut out = String::new();
        for file in ctx.files_for(FileType::Style, Target::Client) {
            out.push_str(&format!("/* {} */\n", file.path()));
            out.push_str(file.content().unwrap_or(""));
            out.push('\n');
        }

        if ctx.production {
            out = minify::minify_css(&out);
        }

        Ok(vec![Artifact::text("client.css", out)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::test_support::context;

    #[test]
    fn test_styles_in_scan_order_with_banners() {
        let ctx = context(
            vec![
                ("lib/base.css", FileType::Style, vec![Target::Client], "a {}"),
                ("client/site.css", FileType::Style, vec![Target::Client], "b {}"),
                ("server/ops.css", FileType::Style, vec![Target::Server], "c {}"),
                ("main.js", FileType::Script, vec![Target::Client], "js"),
            ],
            false,
        );

        let artifacts = StylesOutput.generate(&ctx).unwrap();
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].path, "client.css");

        let css = String::from_utf8(artifacts[0].content.clone()).unwrap();
        assert_eq!(
            css,
            "/* lib/base.css */\na {}\n/* client/site.css */\nb {}\n"
        );
    }

    #[test]
    fn test_production_strips_comments_but_not_content() {
        let ctx = context(
            vec![(
                "client/site.css",
                FileType::Style,
                vec![Target::Client],
                "/* noisy */\nbody { color: red; }",
            )],
            true,
        );
        let artifacts = StylesOutput.generate(&ctx).unwrap();
        let css = String::from_utf8(artifacts[0].content.clone()).unwrap();
        assert!(css.contains("body { color: red; }"));
        assert!(!css.contains("noisy"));
    }
}
