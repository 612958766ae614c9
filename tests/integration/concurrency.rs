//! Mutations racing readers: every snapshot is a whole panel.

use super::test_utils::{tree_keys, Workspace};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

#[test]
fn test_readers_never_observe_partial_panels() {
    let ws = Workspace::new();
    ws.write_tool("a.xml", "a_tool", "1.0");
    ws.write_tool("b.xml", "b_tool", "1.0");
    ws.write_tool("c.xml", "c_tool", "1.0");
    ws.write(
        "tool_conf.xml",
        r#"<toolbox>
    <tool file="a.xml"/>
    <section id="s" name="S">
        <label id="l" text="L"/>
        <tool file="b.xml"/>
    </section>
    <tool file="c.xml"/>
</toolbox>"#,
    );
    let toolbox = ws.toolbox(&["tool_conf.xml"]);
    toolbox.load_all(false);
    let baseline = tree_keys(&toolbox.panel());
    assert_eq!(
        baseline,
        vec!["tool_a_tool", "s", "s/label_l", "s/tool_b_tool", "tool_c_tool"]
    );

    let done = AtomicBool::new(false);
    let reads = AtomicUsize::new(0);
    let b_path = ws.path("b.xml");

    thread::scope(|scope| {
        for _ in 0..3 {
            scope.spawn(|| {
                loop {
                    let finished = done.load(Ordering::SeqCst);
                    assert_eq!(tree_keys(&toolbox.panel()), baseline);
                    assert!(toolbox.get_tool("b_tool", None).is_some());
                    assert_eq!(toolbox.tools().len(), 3);
                    reads.fetch_add(1, Ordering::SeqCst);
                    if finished {
                        break;
                    }
                }
            });
        }

        let full = scope.spawn(|| {
            for _ in 0..25 {
                let report = toolbox.load_all(false);
                assert_eq!(report.tools_loaded, 3);
            }
        });
        let single = scope.spawn(|| {
            for _ in 0..25 {
                let tool = toolbox.load_single_tool(&b_path).unwrap();
                assert_eq!(tool.map(|t| t.id.clone()), Some("b_tool".to_string()));
            }
        });
        full.join().unwrap();
        single.join().unwrap();
        done.store(true, Ordering::SeqCst);
    });

    assert!(reads.load(Ordering::SeqCst) >= 3);
    assert_eq!(tree_keys(&toolbox.panel()), baseline);
}
