//! Loading configuration sources into the live panel.

use super::test_utils::{keys, tree_keys, Workspace};
use toolpanel::panel::PanelItem;

fn shed_conf(file: &str, version: &str) -> String {
    format!(
        r#"<tool file="{}" guid="shed.example.org/repos/devteam/bwa/bwa/{}">
    <tool_shed>shed.example.org</tool_shed>
    <repository_name>bwa</repository_name>
    <repository_owner>devteam</repository_owner>
    <installed_changeset_revision>abc123</installed_changeset_revision>
</tool>"#,
        file, version
    )
}

#[test]
fn test_loading_twice_yields_identical_panel() {
    let ws = Workspace::new();
    ws.write_tool("cat.xml", "cat1", "1.0");
    ws.write_tool("sort.xml", "sort1", "1.0");
    ws.write_tool("grep.xml", "grep1", "1.0");
    ws.write(
        "tool_conf.xml",
        r#"<toolbox>
    <label id="start" text="Get Started"/>
    <tool file="cat.xml"/>
    <section id="text" name="Text Manipulation">
        <tool file="sort.xml"/>
        <label id="search" text="Search"/>
        <tool file="grep.xml"/>
    </section>
</toolbox>"#,
    );

    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    toolbox.load_all(true);
    let first = toolbox.panel();
    toolbox.load_all(true);
    let second = toolbox.panel();

    assert_eq!(first, second);
    assert_eq!(
        tree_keys(&second),
        vec![
            "label_start",
            "tool_cat1",
            "text",
            "text/tool_sort1",
            "text/label_search",
            "text/tool_grep1",
        ]
    );
}

#[test]
fn test_newer_release_from_later_source_keeps_position() {
    let ws = Workspace::new();
    ws.write_tool("demo_a.xml", "demo", "1.0");
    ws.write_tool("demo_b.xml", "demo", "2.0");
    ws.write_tool("other.xml", "other", "1.0");
    ws.write("a.xml", r#"<toolbox><tool file="demo_a.xml"/></toolbox>"#);
    ws.write(
        "b.xml",
        r#"<toolbox><tool file="demo_b.xml"/><tool file="other.xml"/></toolbox>"#,
    );

    let toolbox = ws.toolbox(&["a.xml", "b.xml"]);
    toolbox.load_all(false);
    let panel = toolbox.panel();

    assert_eq!(keys(&panel), vec!["tool_demo", "tool_other"]);
    let demo = panel.get_tool_with_id("demo").unwrap();
    assert_eq!(demo.version, "2.0");
    assert_eq!(demo.config_file, ws.path("demo_b.xml"));
    assert_eq!(toolbox.get_tool("demo", None).unwrap().version, "2.0");
}

#[test]
fn test_older_release_never_replaces_newer() {
    let ws = Workspace::new();
    ws.write_tool("demo_new.xml", "demo", "2.0");
    ws.write_tool("demo_old.xml", "demo", "1.0");
    ws.write("a.xml", r#"<toolbox><tool file="demo_new.xml"/></toolbox>"#);
    ws.write("b.xml", r#"<toolbox><tool file="demo_old.xml"/></toolbox>"#);

    let toolbox = ws.toolbox(&["a.xml", "b.xml"]);
    toolbox.load_all(false);

    assert_eq!(toolbox.panel().get_tool_with_id("demo").unwrap().version, "2.0");
    assert_eq!(toolbox.get_tool("demo", None).unwrap().version, "2.0");
    assert_eq!(toolbox.get_tool("demo", Some("1.0")).unwrap().version, "1.0");
}

#[test]
fn test_shed_lineage_replaces_in_place_in_either_order() {
    let ws = Workspace::new();
    ws.write_tool("cat.xml", "cat1", "1.0");
    ws.write_tool("sort.xml", "sort1", "1.0");
    ws.write_tool("bwa_07.xml", "bwa", "0.7");
    ws.write_tool("bwa_08.xml", "bwa", "0.8");
    ws.write(
        "old.xml",
        &format!(
            r#"<toolbox><tool file="cat.xml"/>{}<tool file="sort.xml"/></toolbox>"#,
            shed_conf("bwa_07.xml", "0.7")
        ),
    );
    ws.write(
        "new.xml",
        &format!("<toolbox>{}</toolbox>", shed_conf("bwa_08.xml", "0.8")),
    );
    let newer_key = "tool_shed.example.org/repos/devteam/bwa/bwa/0.8";

    let toolbox = ws.toolbox(&["old.xml", "new.xml"]);
    toolbox.load_all(false);
    assert_eq!(keys(&toolbox.panel()), vec!["tool_cat1", newer_key, "tool_sort1"]);

    let reversed = Workspace::new();
    for (file, id, version) in [
        ("cat.xml", "cat1", "1.0"),
        ("sort.xml", "sort1", "1.0"),
        ("bwa_07.xml", "bwa", "0.7"),
        ("bwa_08.xml", "bwa", "0.8"),
    ] {
        reversed.write_tool(file, id, version);
    }
    reversed.write("old.xml", &std::fs::read_to_string(ws.path("old.xml")).unwrap());
    reversed.write("new.xml", &std::fs::read_to_string(ws.path("new.xml")).unwrap());
    let toolbox = reversed.toolbox(&["new.xml", "old.xml"]);
    toolbox.load_all(false);
    assert_eq!(keys(&toolbox.panel()), vec![newer_key, "tool_cat1", "tool_sort1"]);

    let versions: Vec<String> = toolbox
        .get_all_versions("shed.example.org/repos/devteam/bwa/bwa/0.7")
        .iter()
        .map(|t| t.version.clone())
        .collect();
    assert_eq!(versions, vec!["0.7", "0.8"]);
}

#[test]
fn test_sections_merge_across_sources() {
    let ws = Workspace::new();
    ws.write_tool("cat.xml", "cat1", "1.0");
    ws.write_tool("sort.xml", "sort1", "1.0");
    ws.write(
        "a.xml",
        r#"<toolbox><section id="text" name="Text"><tool file="cat.xml"/></section></toolbox>"#,
    );
    ws.write(
        "b.yml",
        r#"
items:
  - type: section
    id: text
    name: Text
    items:
      - type: tool
        file: sort.xml
"#,
    );

    let toolbox = ws.toolbox(&["a.xml", "b.yml"]);
    let report = toolbox.load_all(false);
    assert_eq!(report.sources_loaded, 2);
    assert_eq!(
        tree_keys(&toolbox.panel()),
        vec!["text", "text/tool_cat1", "text/tool_sort1"]
    );
    assert_eq!(
        toolbox.section_for_tool("sort1"),
        Some(("text".to_string(), "Text".to_string()))
    );
}

#[test]
fn test_broken_tool_and_unknown_workflow_are_skipped() {
    let ws = Workspace::new();
    ws.write_tool("cat.xml", "cat1", "1.0");
    ws.write("broken.xml", "<tool version=\"1.0\"/>");
    ws.write(
        "tool_conf.xml",
        r#"<toolbox>
    <tool file="broken.xml"/>
    <tool file="missing.xml"/>
    <workflow id="not_there"/>
    <tool file="cat.xml"/>
</toolbox>"#,
    );

    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    let report = toolbox.load_all(false);
    assert_eq!(report.failed_tools.len(), 2);
    assert_eq!(keys(&toolbox.panel()), vec!["tool_cat1"]);
}

#[test]
fn test_tool_directory_is_scanned_in_name_order() {
    let ws = Workspace::new();
    ws.write_tool("scanned/b.xml", "b_tool", "1.0");
    ws.write_tool("scanned/a.xml", "a_tool", "1.0");
    ws.write_tool("scanned/.hidden/c.xml", "c_tool", "1.0");
    ws.write("scanned/notes.txt", "not a tool");
    ws.write("scanned/data.xml", "<dataset/>");
    ws.write(
        "tool_conf.xml",
        r#"<toolbox><section id="local" name="Local"><tool_dir dir="scanned"/></section></toolbox>"#,
    );

    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    toolbox.load_all(false);
    assert_eq!(
        tree_keys(&toolbox.panel()),
        vec!["local", "local/tool_a_tool", "local/tool_b_tool"]
    );
}

#[test]
fn test_tool_directory_keeps_declared_order_with_following_items() {
    let ws = Workspace::new();
    ws.write_tool("scanned/a.xml", "a_tool", "1.0");
    ws.write_tool("scanned/b.xml", "b_tool", "1.0");
    ws.write_tool("c.xml", "c_tool", "1.0");
    ws.write_tool("local/e.xml", "e_tool", "1.0");
    ws.write_tool("local/f.xml", "f_tool", "1.0");
    ws.write_tool("g.xml", "g_tool", "1.0");
    ws.write(
        "tool_conf.xml",
        r#"<toolbox>
    <tool_dir dir="scanned"/>
    <tool file="c.xml"/>
    <section id="s" name="S"><tool_dir dir="local"/><tool file="g.xml"/></section>
</toolbox>"#,
    );
    let expected = vec![
        "tool_a_tool",
        "tool_b_tool",
        "tool_c_tool",
        "s",
        "s/tool_e_tool",
        "s/tool_f_tool",
        "s/tool_g_tool",
    ];

    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    toolbox.load_all(true);
    assert_eq!(tree_keys(&toolbox.panel()), expected);

    toolbox.load_all(true);
    assert_eq!(tree_keys(&toolbox.panel()), expected);

    let restarted = ws.toolbox(&["tool_conf.xml"]);
    restarted.load_all(false);
    assert_eq!(tree_keys(&restarted.panel()), expected);
}

#[test]
fn test_hidden_tools_stay_in_live_panel() {
    let ws = Workspace::new();
    ws.write_tool("cat.xml", "cat1", "1.0");
    ws.write_tool("secret.xml", "secret", "1.0");
    ws.write(
        "tool_conf.xml",
        r#"<toolbox><tool file="cat.xml"/><tool file="secret.xml" hidden="true"/></toolbox>"#,
    );

    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    toolbox.load_all(false);
    let panel = toolbox.panel();
    assert!(matches!(
        panel.get("tool_secret"),
        Some(PanelItem::Tool(Some(tool))) if tool.hidden
    ));
    assert!(toolbox.has_tool("secret"));
}
