use crate::core::plan_builder::ReorganizationPlan;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Default)]
struct Node {
    children: BTreeMap<String, Node>,
}

impl Node {
    fn insert(&mut self, path: &Path) {
        let mut node = self;
        for component in path.components() {
            let name = component.as_os_str().to_string_lossy().to_string();
            node = node.children.entry(name).or_default();
        }
    }

    fn render(&self, prefix: &str, out: &mut String) {
        let count = self.children.len();
        for (index, (name, child)) in self.children.iter().enumerate() {
            let last = index + 1 == count;
            out.push_str(prefix);
            out.push_str(if last { "└── " } else { "├── " });
            out.push_str(name);
            out.push('\n');

            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            child.render(&child_prefix, out);
        }
    }
}

/// Draws the plan's destinations as a tree under `root_label`
pub fn render_tree(root_label: &str, plan: &ReorganizationPlan) -> String {
    let mut root = Node::default();
    for entry in &plan.entries {
        root.insert(&entry.dst_path);
    }

    let mut out = format!("{}\n", root_label);
    root.render("", &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::PlanEntry;
    use std::path::PathBuf;

    fn plan(destinations: &[&str]) -> ReorganizationPlan {
        let mut plan = ReorganizationPlan::empty(Path::new("/docs"));
        plan.entries = destinations
            .iter()
            .map(|dst| PlanEntry {
                src_path: PathBuf::from("/docs/x"),
                dst_path: PathBuf::from(dst),
                summary: String::new(),
            })
            .collect();
        plan
    }

    #[test]
    fn test_groups_shared_prefixes() {
        let rendered = render_tree(
            "docs",
            &plan(&["notes/b.txt", "notes/a.txt", "images/2024/cat.png", "readme.md"]),
        );

        let expected = "\
docs
├── images
│   └── 2024
│       └── cat.png
├── notes
│   ├── a.txt
│   └── b.txt
└── readme.md
";
        assert_eq!(rendered, expected);
    }

    #[test]
    fn test_empty_plan_renders_root_only() {
        assert_eq!(render_tree("docs", &plan(&[])), "docs\n");
    }
}
