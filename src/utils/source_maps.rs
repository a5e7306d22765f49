// Source map helpers on top of oxc_sourcemap
use oxc_sourcemap::{SourceMap, SourceMapBuilder};

/// Identity map of a module emitted line for line: every non-empty line
/// starts at column 0 of the same source line.
pub fn line_map(source_name: &str, content: &str) -> SourceMap {
    let mut builder = SourceMapBuilder::default();
    let source_id = builder.add_source_and_content(source_name, content);

    for (line, text) in content.lines().enumerate() {
        if !text.trim().is_empty() {
            builder.add_token(line as u32, 0, line as u32, 0, Some(source_id), None);
        }
    }

    builder.into_sourcemap()
}

/// Trailer linking a script to its external map
pub fn external_comment(map_file_name: &str) -> String {
    format!("//# sourceMappingURL={}", map_file_name)
}

/// Root-relative module id as seen from the directory of `file_name`
pub fn relative_source(file_name: &str, id: &str) -> String {
    format!("{}{}", "../".repeat(file_name.matches('/').count()), id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_map_skips_blank_lines() {
        let map = line_map("src/a.js", "a();\n\nb();\n");
        let lines: Vec<(u32, u32)> = map
            .get_tokens()
            .map(|t| (t.get_dst_line(), t.get_src_line()))
            .collect();

        assert_eq!(lines, vec![(0, 0), (2, 2)]);
        assert_eq!(map.get_source_content(0).map(|c| c.as_ref()), Some("a();\n\nb();\n"));
    }

    #[test]
    fn test_relative_source() {
        assert_eq!(relative_source("assets/js/index-abc.js", "src/main.ts"), "../../src/main.ts");
        assert_eq!(relative_source("index.js", "src/main.ts"), "src/main.ts");
        assert_eq!(external_comment("index.js.map"), "//# sourceMappingURL=index.js.map");
    }
}
