//! Views and per-caller filtering over a loaded panel.

use super::test_utils::{keys, tree_keys, Workspace};
use toolpanel::error::{FilterConfigError, ToolBoxError, ViewError};
use toolpanel::filter::FilterContext;

fn loaded_workspace() -> Workspace {
    let ws = Workspace::new();
    ws.write_tool("cat.xml", "cat1", "1.0");
    ws.write_tool("x.xml", "x", "1.0");
    ws.write_tool("sort.xml", "sort1", "1.0");
    ws.write(
        "tool_conf.xml",
        r#"<toolbox>
    <tool file="cat.xml"/>
    <tool file="x.xml"/>
    <section id="text" name="Text"><tool file="sort.xml"/></section>
</toolbox>"#,
    );
    ws
}

#[test]
fn test_static_view_without_items_excludes_one_tool() {
    let ws = loaded_workspace();
    ws.write(
        "views/no_x.yml",
        r#"
id: no_x
name: Everything but x
type: generic
excludes:
  - tool_id: x
"#,
    );
    let mut config = ws.config(&["tool_conf.xml"]);
    config.panel_views_dir = Some(ws.path("views"));
    let toolbox = toolpanel::ToolBox::builder(config).build();
    toolbox.load_all(false);

    assert_eq!(toolbox.view_ids(), vec!["default", "no_x"]);
    let view = toolbox.panel_view("no_x").unwrap();
    assert_eq!(
        tree_keys(&view),
        vec!["tool_cat1", "text", "text/tool_sort1"]
    );
    assert_eq!(
        tree_keys(&toolbox.panel_view("default").unwrap()),
        vec!["tool_cat1", "tool_x", "text", "text/tool_sort1"]
    );
}

#[test]
fn test_unknown_view_is_an_error() {
    let ws = loaded_workspace();
    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    toolbox.load_all(false);

    assert!(matches!(
        toolbox.panel_view("missing"),
        Err(ViewError::UnknownView(id)) if id == "missing"
    ));
}

#[test]
fn test_filtering_drops_empty_labels_and_sections() {
    let ws = Workspace::new();
    ws.write_tool("cat.xml", "cat1", "1.0");
    ws.write(
        "secret.xml",
        r#"<tool id="secret" name="Secret" version="1.0" require_login="true"/>"#,
    );
    ws.write_tool("hidden.xml", "hidden1", "1.0");
    ws.write(
        "tool_conf.xml",
        r#"<toolbox>
    <label id="members" text="Members only"/>
    <tool file="secret.xml"/>
    <label id="public" text="Public"/>
    <tool file="cat.xml"/>
    <section id="internal" name="Internal"><tool file="hidden.xml" hidden="true"/></section>
</toolbox>"#,
    );
    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    toolbox.load_all(false);

    let anonymous = toolbox
        .filtered_panel(None, &FilterContext::anonymous())
        .unwrap();
    assert_eq!(keys(&anonymous.panel), vec!["label_public", "tool_cat1"]);

    let user = toolbox
        .filtered_panel(None, &FilterContext::user("alice"))
        .unwrap();
    assert_eq!(
        keys(&user.panel),
        vec!["label_members", "tool_secret", "label_public", "tool_cat1"]
    );
}

#[test]
fn test_per_user_filters_outside_allow_list_are_reported() {
    let ws = loaded_workspace();
    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    toolbox.load_all(false);

    let mut ctx = FilterContext::user("alice");
    ctx.preferences.tool = vec!["restrict_to_admins".to_string()];
    let filtered = toolbox.filtered_panel(None, &ctx).unwrap();
    assert_eq!(
        filtered.errors,
        vec![FilterConfigError::NotAllowed("restrict_to_admins".to_string())]
    );
    assert_eq!(
        keys(&filtered.panel),
        vec!["tool_cat1", "tool_x", "text"]
    );

    assert!(matches!(
        toolbox.filtered_panel(Some("nope"), &ctx),
        Err(ToolBoxError::View(_))
    ));
}
