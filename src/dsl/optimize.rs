use std::collections::HashSet;

use tracing::debug;

use super::types::ResourceLocation;
use crate::project::{FunctionTag, Project};

/// Clean up synthesized command lists after generation. Only lists under
/// `<namespace>:<generated_dir>/` are touched. Returns how many were removed.
pub fn optimize(project: &mut Project, generated_dir: &str) -> usize {
    let prefix = format!("{generated_dir}/");
    let removed = remove_empty(project, &prefix) + remove_unreferenced(project, &prefix);
    if removed > 0 {
        debug!(removed, remaining = project.function_count(), "Optimized command lists");
    }
    removed
}

/// The function a command ends up invoking: the text after the last ` run `
/// (or the whole command) when it is `function <id>`.
pub fn invoked(command: &str) -> Option<ResourceLocation> {
    let action = command.rsplit_once(" run ").map_or(command, |(_, action)| action);
    action.strip_prefix("function ").map(|id| ResourceLocation::parse(id.trim()))
}

fn is_generated(project: &Project, id: &ResourceLocation, prefix: &str) -> bool {
    id.namespace == project.namespace && id.path.starts_with(prefix)
}

fn is_tagged(project: &Project, id: &ResourceLocation) -> bool {
    [FunctionTag::Load, FunctionTag::Tick]
        .into_iter()
        .any(|tag| project.tagged(tag).contains(id))
}

/// Drop empty lists and every command that calls one. Dropping a call can
/// empty its caller, so this repeats until nothing changes.
fn remove_empty(project: &mut Project, prefix: &str) -> usize {
    let mut removed = 0;
    loop {
        let empty: HashSet<ResourceLocation> = project
            .functions()
            .filter(|(id, lines)| lines.is_empty() && is_generated(project, id, prefix) && !is_tagged(project, id))
            .map(|(id, _)| id.clone())
            .collect();
        if empty.is_empty() {
            return removed;
        }
        for id in &empty {
            debug!(id = %id, "Removed empty command list");
            project.remove_function(id);
            removed += 1;
        }
        for (_, lines) in project.functions_mut() {
            lines.retain(|line| !invoked(line).is_some_and(|target| empty.contains(&target)));
        }
    }
}

/// Drop untagged lists nothing else calls. Self-calls (loops) don't count.
fn remove_unreferenced(project: &mut Project, prefix: &str) -> usize {
    let mut removed = 0;
    loop {
        let referenced: HashSet<ResourceLocation> = project
            .functions()
            .flat_map(|(caller, lines)| {
                lines
                    .iter()
                    .filter_map(|line| invoked(line))
                    .filter(move |target| target != caller)
            })
            .collect();
        let orphans: Vec<ResourceLocation> = project
            .functions()
            .map(|(id, _)| id)
            .filter(|id| is_generated(project, id, prefix) && !is_tagged(project, id) && !referenced.contains(*id))
            .cloned()
            .collect();
        if orphans.is_empty() {
            return removed;
        }
        for id in &orphans {
            debug!(id = %id, "Removed unreferenced command list");
            project.remove_function(id);
            removed += 1;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const DIR: &str = "__generated__";

    fn id(path: &str) -> ResourceLocation {
        ResourceLocation::new("ds", path)
    }

    fn project(functions: &[(&str, &[&str])]) -> Project {
        let mut project = Project::new("ds");
        for (path, lines) in functions {
            project.add_function(id(path), lines.iter().map(ToString::to_string).collect());
        }
        project.tag(FunctionTag::Load, id("main"));
        project
    }

    #[test]
    fn terminal_action_is_found() {
        assert_eq!(invoked("function ds:a"), Some(id("a")));
        assert_eq!(
            invoked("execute as @a run execute if score #x o matches 1 run function ds:b"),
            Some(id("b"))
        );
        assert_eq!(invoked("execute if score #x o matches 1 run say function"), None);
        assert_eq!(invoked("say hi"), None);
    }

    #[test]
    fn empty_lists_and_their_callers_cascade() {
        let mut p = project(&[
            ("main", &["say start", "execute if score #a o matches 1 run function ds:__generated__/outer_0"]),
            ("__generated__/outer_0", &["function ds:__generated__/inner_0"]),
            ("__generated__/inner_0", &[]),
        ]);
        assert_eq!(optimize(&mut p, DIR), 2);
        assert_eq!(p.function(&id("main")).unwrap(), ["say start"]);
        assert_eq!(p.function_count(), 1);
    }

    #[test]
    fn user_functions_are_kept_even_when_empty() {
        let mut p = project(&[("main", &["function ds:helper"]), ("helper", &[])]);
        assert_eq!(optimize(&mut p, DIR), 0);
        assert_eq!(p.function(&id("main")).unwrap(), ["function ds:helper"]);
    }

    #[test]
    fn orphaned_loops_are_removed() {
        let mut p = project(&[
            ("main", &["function ds:__generated__/while_1"]),
            ("__generated__/while_0", &["say loop", "execute if score $i o matches ..4 run function ds:__generated__/while_0"]),
            ("__generated__/while_1", &["say loop", "function ds:__generated__/while_1"]),
        ]);
        assert_eq!(optimize(&mut p, DIR), 1);
        assert!(p.function(&id("__generated__/while_0")).is_none());
        assert!(p.function(&id("__generated__/while_1")).is_some());
    }

    #[test]
    fn tagged_generated_lists_survive() {
        let mut p = project(&[("main", &["say hi"]), ("__generated__/init", &["scoreboard objectives add o dummy"])]);
        p.tag_first(FunctionTag::Load, id("__generated__/init"));
        assert_eq!(optimize(&mut p, DIR), 0);
        assert_eq!(p.function_count(), 2);
    }
}
