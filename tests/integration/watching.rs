//! Incremental reload driven by file watching.

use super::test_utils::{bump_mtime, Workspace};
use std::sync::Arc;
use std::time::{Duration, Instant};
use toolpanel::ToolBox;

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    condition()
}

#[test]
fn test_edited_tool_file_is_reloaded() {
    let ws = Workspace::new();
    ws.write_tool("cat.xml", "cat1", "1.0");
    ws.write("tool_conf.xml", r#"<toolbox><tool file="cat.xml"/></toolbox>"#);
    let mut config = ws.config(&["tool_conf.xml"]);
    config.watch_tools = true;
    config.watch_debounce_ms = 50;
    let toolbox = Arc::new(ToolBox::builder(config).build());
    toolbox.load_all(false);
    toolbox.start_watching().unwrap();
    assert!(toolbox.is_watching());

    let path = ws.write_tool("cat.xml", "cat1", "2.0");
    bump_mtime(&path);
    assert!(wait_for(|| toolbox
        .get_tool("cat1", None)
        .map(|t| t.version == "2.0")
        .unwrap_or(false)));

    toolbox.stop_watching();
    assert!(!toolbox.is_watching());
}

#[test]
fn test_new_file_in_watched_directory_is_added() {
    let ws = Workspace::new();
    ws.write_tool("local/a.xml", "a_tool", "1.0");
    ws.write(
        "tool_conf.xml",
        r#"<toolbox monitor="true"><tool_dir dir="local" recursive="false"/></toolbox>"#,
    );
    let mut config = ws.config(&["tool_conf.xml"]);
    config.watch_debounce_ms = 50;
    let toolbox = Arc::new(ToolBox::builder(config).build());
    toolbox.load_all(false);
    toolbox.start_watching().unwrap();
    assert!(toolbox.has_tool("a_tool"));

    ws.write_tool("local/b.xml", "b_tool", "1.0");
    assert!(wait_for(|| toolbox.has_tool("b_tool")));
    assert!(toolbox.panel().has_tool_with_id("b_tool"));
}
