//! Determining Execution Order
//!
//! Tasks run in an order where every task comes after the tasks it declares
//! in `after`. The order is deterministic: a depth-first traversal in
//! declaration order, visiting dependencies before their dependents
//! (post-order). Tasks unrelated to each other keep their declaration order.
//!
//! A dependency cycle is a configuration error. The traversal keeps the
//! current path so the error can show the whole loop.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::task::Task;

/// Returns the indices of `tasks` in execution order.
pub fn execution_order(tasks: &[Task]) -> Result<Vec<usize>> {
    let index: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.filename.as_str(), i))
        .collect();

    let mut order = Vec::with_capacity(tasks.len());
    let mut visited = HashSet::new();
    let mut path = Vec::new();

    for i in 0..tasks.len() {
        visit(i, tasks, &index, &mut order, &mut visited, &mut path)?;
    }

    Ok(order)
}

fn visit(
    i: usize,
    tasks: &[Task],
    index: &HashMap<&str, usize>,
    order: &mut Vec<usize>,
    visited: &mut HashSet<usize>,
    path: &mut Vec<usize>,
) -> Result<()> {
    if visited.contains(&i) {
        return Ok(());
    }

    if let Some(start) = path.iter().position(|&p| p == i) {
        let mut cycle: Vec<&str> = path[start..]
            .iter()
            .map(|&p| tasks[p].name.as_str())
            .collect();
        cycle.push(tasks[i].name.as_str());
        return Err(Error::config_with_hint(
            format!("Dependency cycle detected: {}", cycle.join(" -> ")),
            "Remove one of the 'after' entries in the loop",
        ));
    }

    path.push(i);
    for dep in &tasks[i].depends_on {
        let dep_index = *index.get(dep.as_str()).ok_or_else(|| {
            Error::config(format!(
                "'{}' runs after unknown task '{}'",
                tasks[i].name, dep
            ))
        })?;
        visit(dep_index, tasks, index, order, visited, path)?;
    }
    path.pop();

    visited.insert(i);
    order.push(i);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scm::Scm;

    fn task(name: &str, after: &[&str]) -> Task {
        let mut task = Task::new(Scm::Git, format!("https://example.com/{}.git", name), name, "/out");
        task.depends_on = after.iter().map(|s| s.to_string()).collect();
        task
    }

    fn names(tasks: &[Task], order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| tasks[i].filename.clone()).collect()
    }

    #[test]
    fn test_order_independent_tasks_keep_declaration_order() {
        let tasks = vec![task("a", &[]), task("b", &[]), task("c", &[])];
        let order = execution_order(&tasks).unwrap();
        assert_eq!(names(&tasks, &order), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_order_dependency_first() {
        let tasks = vec![task("kanku", &["libpipeline"]), task("libpipeline", &[])];
        let order = execution_order(&tasks).unwrap();
        assert_eq!(names(&tasks, &order), vec!["libpipeline", "kanku"]);
    }

    #[test]
    fn test_order_diamond() {
        // a -> b, a -> c, b -> d, c -> d
        let tasks = vec![
            task("a", &["b", "c"]),
            task("b", &["d"]),
            task("c", &["d"]),
            task("d", &[]),
        ];
        let order = execution_order(&tasks).unwrap();
        assert_eq!(names(&tasks, &order), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_order_cycle() {
        let tasks = vec![task("a", &["b"]), task("b", &["c"]), task("c", &["a"])];
        let err = execution_order(&tasks).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("a -> b -> c -> a"));
    }

    #[test]
    fn test_order_self_dependency() {
        let tasks = vec![task("a", &["a"])];
        assert!(execution_order(&tasks).is_err());
    }

    #[test]
    fn test_order_unknown_dependency() {
        let tasks = vec![task("a", &["ghost"])];
        let err = execution_order(&tasks).unwrap_err();
        assert!(err.to_string().contains("unknown task 'ghost'"));
    }

    #[test]
    fn test_order_empty() {
        assert!(execution_order(&[]).unwrap().is_empty());
    }
}
