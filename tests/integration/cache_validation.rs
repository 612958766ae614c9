//! Tool cache validation against the files on disk.

use super::test_utils::{bump_mtime, Workspace};
use std::sync::Arc;
use toolpanel::cache::ToolCache;
use toolpanel::tool::{DescriptorToolParser, ToolParser};

#[test]
fn test_touch_keeps_entry_and_edit_invalidates() {
    let ws = Workspace::new();
    let path = ws.write_tool("cat.xml", "cat1", "1.0");
    let parser = DescriptorToolParser::new();
    let cache = ToolCache::new();
    let tool = Arc::new(parser.parse_tool(&path, None).unwrap());
    cache.put(&path, Arc::clone(&tool));

    bump_mtime(&path);
    let cached = cache.get(&path).unwrap();
    assert!(Arc::ptr_eq(&cached, &tool));

    ws.write_tool("cat.xml", "cat1", "1.1");
    bump_mtime(&path);
    assert!(cache.get(&path).is_none());
    assert_eq!(cache.sweep(), vec!["cat1".to_string()]);
    assert!(cache.is_empty());
}

#[test]
fn test_failed_reparse_keeps_stale_tool() {
    let ws = Workspace::new();
    let path = ws.write_tool("cat.xml", "cat1", "1.0");
    ws.write("tool_conf.xml", r#"<toolbox><tool file="cat.xml"/></toolbox>"#);
    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    toolbox.load_all(false);

    ws.write("cat.xml", "<tool id=");
    bump_mtime(&path);
    let kept = toolbox.load_single_tool(&path).unwrap().unwrap();
    assert_eq!(kept.version, "1.0");
    assert!(toolbox.cache().is_stale(&path));
    assert!(toolbox.has_tool("cat1"));
}

#[test]
fn test_cleanup_drops_edited_tools_until_reload() {
    let ws = Workspace::new();
    let path = ws.write_tool("cat.xml", "cat1", "1.0");
    ws.write("tool_conf.xml", r#"<toolbox><tool file="cat.xml"/></toolbox>"#);
    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    toolbox.load_all(false);

    bump_mtime(&path);
    assert!(toolbox.cleanup().is_empty());
    assert!(toolbox.has_tool("cat1"));

    ws.write_tool("cat.xml", "cat1", "2.0");
    bump_mtime(&path);
    assert_eq!(toolbox.cleanup(), vec!["cat1".to_string()]);
    assert!(!toolbox.has_tool("cat1"));
    assert!(toolbox.integrated_panel().elements().get("tool_cat1").unwrap().is_stub());

    toolbox.load_all(false);
    assert_eq!(toolbox.get_tool("cat1", None).unwrap().version, "2.0");
}
