//! Integrated panel persistence across restarts.

use super::test_utils::{keys, tree_keys, Workspace};
use toolpanel::integrated::IntegratedPanel;
use toolpanel::panel::PanelItem;

fn mixed_workspace() -> Workspace {
    let ws = Workspace::new();
    ws.write_tool("cat.xml", "cat1", "1.0");
    ws.write_tool("sort.xml", "sort1", "1.0");
    ws.write_tool("grep.xml", "grep1", "1.0");
    ws.write_tool("wc.xml", "wc1", "1.0");
    ws.write(
        "a.xml",
        r#"<toolbox>
    <label id="start" text="Get Started"/>
    <tool file="cat.xml"/>
    <section id="text" name="Text"><tool file="sort.xml"/></section>
</toolbox>"#,
    );
    ws.write(
        "b.xml",
        r#"<toolbox>
    <section id="text" name="Text"><tool file="grep.xml"/></section>
    <tool file="wc.xml"/>
</toolbox>"#,
    );
    ws
}

#[test]
fn test_round_trip_restores_panel_order() {
    let ws = mixed_workspace();
    let before = {
        let toolbox = ws.toolbox(&["a.xml", "b.xml"]);
        let report = toolbox.load_all(true);
        assert!(report.persisted);
        toolbox.panel()
    };

    let stubs = IntegratedPanel::load(&ws.path("integrated_tool_panel.xml")).unwrap();
    assert!(matches!(stubs.elements().get("tool_cat1"), Some(PanelItem::Tool(None))));
    assert_eq!(tree_keys(stubs.elements()), tree_keys(&before));

    let toolbox = ws.toolbox(&["a.xml", "b.xml"]);
    toolbox.load_all(true);
    assert_eq!(tree_keys(&toolbox.panel()), tree_keys(&before));
    assert_eq!(
        tree_keys(&before),
        vec![
            "label_start",
            "tool_cat1",
            "text",
            "text/tool_sort1",
            "text/tool_grep1",
            "tool_wc1",
        ]
    );
}

#[test]
fn test_edited_integrated_order_reorders_panel() {
    let ws = Workspace::new();
    ws.write_tool("a.xml", "a_tool", "1.0");
    ws.write_tool("b.xml", "b_tool", "1.0");
    ws.write(
        "tool_conf.xml",
        r#"<toolbox><tool file="a.xml"/><tool file="b.xml"/></toolbox>"#,
    );
    ws.write(
        "integrated_tool_panel.xml",
        r#"<?xml version="1.0"?>
<toolbox>
    <tool id="b_tool"/>
    <tool id="gone"/>
    <tool id="a_tool"/>
</toolbox>"#,
    );

    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    toolbox.load_all(true);
    assert_eq!(keys(&toolbox.panel()), vec!["tool_b_tool", "tool_a_tool"]);

    let integrated = toolbox.integrated_panel();
    assert_eq!(
        keys(integrated.elements()),
        vec!["tool_b_tool", "tool_gone", "tool_a_tool"]
    );
    assert!(integrated.elements().get("tool_gone").unwrap().is_stub());
    let written = std::fs::read_to_string(ws.path("integrated_tool_panel.xml")).unwrap();
    assert!(written.contains(r#"<tool id="gone"/>"#));
}

#[test]
fn test_read_only_never_writes() {
    let ws = mixed_workspace();
    let mut config = ws.config(&["a.xml"]);
    config.read_only = true;
    let toolbox = toolpanel::ToolBox::builder(config).build();

    let report = toolbox.load_all(true);
    assert!(!report.persisted);
    assert!(toolbox.save_integrated_panel().unwrap().is_none());
    assert!(!ws.path("integrated_tool_panel.xml").exists());
}

#[test]
fn test_tracking_directory_keeps_copies() {
    let ws = mixed_workspace();
    let mut config = ws.config(&["a.xml"]);
    config.integrated_tool_panel_tracking_directory = Some(ws.path("tracking"));
    let toolbox = toolpanel::ToolBox::builder(config).build();

    toolbox.load_all(true);
    let copies: Vec<_> = std::fs::read_dir(ws.path("tracking")).unwrap().collect();
    assert_eq!(copies.len(), 1);
    assert!(ws.path("integrated_tool_panel.xml").exists());
}

#[test]
fn test_removal_from_integrated_survives_restart() {
    let ws = mixed_workspace();
    let toolbox = ws.toolbox(&["a.xml"]);
    toolbox.load_all(true);
    assert!(toolbox.remove_tool("cat1", true));

    let stubs = IntegratedPanel::load(&ws.path("integrated_tool_panel.xml")).unwrap();
    assert!(!stubs.elements().contains_key("tool_cat1"));
    assert!(stubs.elements().contains_key("label_start"));
}
