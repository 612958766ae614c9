//! Tool lookup through the registry.

use super::test_utils::Workspace;
use toolpanel::error::LookupError;
use toolpanel::ToolQuery;

#[test]
fn test_exact_lookup_requires_direct_hit() {
    let ws = Workspace::new();
    ws.write(
        "cat_v2.xml",
        r#"<tool id="cat_v2" name="Concatenate" version="2.0" old_id="cat"/>"#,
    );
    ws.write("tool_conf.xml", r#"<toolbox><tool file="cat_v2.xml"/></toolbox>"#);
    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    toolbox.load_all(false);

    assert_eq!(toolbox.get_tool("cat", None).unwrap().id, "cat_v2");
    assert!(toolbox.get_tool_exact("cat", None).is_none());
    assert!(toolbox.get_tool_exact("cat_v2", None).is_some());
    assert!(toolbox.get_tool_exact("cat_v2", Some("1.0")).is_none());
}

#[test]
fn test_exact_lookup_ignores_lineage() {
    let ws = Workspace::new();
    ws.write_tool("bwa.xml", "bwa", "0.7");
    ws.write(
        "tool_conf.xml",
        r#"<toolbox><tool file="bwa.xml" guid="shed.example.org/repos/devteam/bwa/bwa/0.7"/></toolbox>"#,
    );
    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    toolbox.load_all(false);

    let versionless = "shed.example.org/repos/devteam/bwa/bwa";
    assert!(toolbox.get_tool(versionless, None).is_some());
    assert!(toolbox.get_tool_exact(versionless, None).is_none());
}

#[test]
fn test_exact_with_all_versions_is_rejected() {
    let ws = Workspace::new();
    ws.write("tool_conf.xml", "<toolbox/>");
    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    toolbox.load_all(false);

    let err = toolbox
        .lookup(&ToolQuery::new("anything").exact().all_versions())
        .unwrap_err();
    assert_eq!(err, LookupError::ExactWithAllVersions("anything".to_string()));
    assert!(toolbox.lookup(&ToolQuery::new("anything")).unwrap().is_empty());
}

#[test]
fn test_configured_shed_hosts_resolve_mirrored_guids() {
    let ws = Workspace::new();
    ws.write_tool("bwa.xml", "bwa", "0.7");
    ws.write(
        "tool_conf.xml",
        r#"<toolbox><tool file="bwa.xml" guid="mirror.example.org/repos/devteam/bwa/bwa/0.7"/></toolbox>"#,
    );
    let mut config = ws.config(&["tool_conf.xml"]);
    config.tool_sheds = vec!["shed.example.org".to_string(), "mirror.example.org".to_string()];
    let toolbox = toolpanel::ToolBox::builder(config).build();
    toolbox.load_all(false);

    let tool = toolbox
        .get_tool("shed.example.org/repos/devteam/bwa/bwa/0.7", None)
        .unwrap();
    assert_eq!(tool.guid.as_deref(), Some("mirror.example.org/repos/devteam/bwa/bwa/0.7"));
    assert!(toolbox.has_tool("other.org/repos/devteam/bwa/bwa/0.7"));
}
