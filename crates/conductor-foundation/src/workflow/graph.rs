//! 工作流依赖图
//! Workflow dependency graph
//!
//! 对任务列表的纯函数视图：依赖校验、环检测、分层拓扑排序。
//! A read-only view over a task list: dependency validation, cycle detection
//! and layered topological ordering.

use super::model::Task;
use conductor_kernel::{OrchestratorError, OrchestratorResult};
use std::collections::{HashMap, HashSet};
use std::fmt::Write;

/// 依赖图
#[derive(Debug, Clone)]
pub struct WorkflowGraph<'a> {
    tasks: &'a [Task],
    index: HashMap<&'a str, usize>,
}

impl<'a> WorkflowGraph<'a> {
    pub fn new(tasks: &'a [Task]) -> Self {
        let index = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.as_str(), i))
            .collect();
        Self { tasks, index }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 校验所有依赖都指向已存在的任务
    /// Every `depends_on` entry must name a task of the same workflow
    pub fn validate(&self) -> OrchestratorResult<()> {
        for task in self.tasks {
            if let Some(missing) = task
                .depends_on
                .iter()
                .find(|dep| !self.index.contains_key(dep.as_str()))
            {
                return Err(OrchestratorError::dependency(format!(
                    "task '{}' depends on unknown task '{}'",
                    task.id, missing
                )));
            }
        }
        Ok(())
    }

    /// 环检测（深度优先，visiting/visited 标记）
    /// Depth-first search for a back edge
    ///
    /// Returns the offending path with its first task repeated at the end,
    /// e.g. `["a", "b", "a"]`. Unknown dependencies are skipped here.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = vec![false; self.tasks.len()];
        let mut visiting = vec![false; self.tasks.len()];

        for start in 0..self.tasks.len() {
            if visited[start] {
                continue;
            }
            if let Some(cycle) = self.visit(start, &mut visiting, &mut visited) {
                return Some(cycle);
            }
        }
        None
    }

    /// Iterative DFS from `start`; the stack holds (task, next dependency)
    fn visit(&self, start: usize, visiting: &mut [bool], visited: &mut [bool]) -> Option<Vec<String>> {
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        visiting[start] = true;

        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            let Some(dep) = self.tasks[node].depends_on.get(cursor) else {
                stack.pop();
                visiting[node] = false;
                visited[node] = true;
                continue;
            };
            frame.1 += 1;

            let Some(&next) = self.index.get(dep.as_str()) else {
                continue;
            };
            if visiting[next] {
                let from = stack.iter().position(|&(n, _)| n == next).unwrap_or(0);
                let mut cycle: Vec<String> = stack[from..]
                    .iter()
                    .map(|&(n, _)| self.tasks[n].id.clone())
                    .collect();
                cycle.push(self.tasks[next].id.clone());
                return Some(cycle);
            }
            if !visited[next] {
                visiting[next] = true;
                stack.push((next, 0));
            }
        }
        None
    }

    /// 依赖校验 + 环检测
    /// Dangling references and cycles both make the graph unsatisfiable
    pub fn check(&self) -> OrchestratorResult<()> {
        self.validate()?;
        match self.find_cycle() {
            Some(cycle) => Err(OrchestratorError::dependency(format!(
                "circular dependency detected: {}",
                cycle.join(" -> ")
            ))),
            None => Ok(()),
        }
    }

    /// 分层（拓扑波次）
    /// Partition tasks into levels
    ///
    /// Every task's dependencies sit in strictly earlier levels. Within a
    /// level tasks are ordered by descending priority, then declaration order.
    pub fn levels(&self) -> OrchestratorResult<Vec<Vec<&'a Task>>> {
        self.check()?;

        let mut done: HashSet<&str> = HashSet::with_capacity(self.tasks.len());
        let mut remaining: Vec<&'a Task> = self.tasks.iter().collect();
        let mut levels = Vec::new();

        while !remaining.is_empty() {
            let (mut ready, blocked): (Vec<&'a Task>, Vec<&'a Task>) = remaining
                .into_iter()
                .partition(|t| t.depends_on.iter().all(|d| done.contains(d.as_str())));

            if ready.is_empty() {
                return Err(OrchestratorError::dependency(
                    "dependency graph cannot be ordered",
                ));
            }

            // stable sort keeps declaration order for equal priorities
            ready.sort_by_key(|t| std::cmp::Reverse(t.effective_priority()));
            done.extend(ready.iter().map(|t| t.id.as_str()));
            levels.push(ready);
            remaining = blocked;
        }

        Ok(levels)
    }

    /// 顺序执行计划
    /// Single deterministic order consistent with [`levels`](Self::levels)
    pub fn execution_order(&self) -> OrchestratorResult<Vec<&'a Task>> {
        Ok(self.levels()?.into_iter().flatten().collect())
    }

    /// 导出 Graphviz DOT
    pub fn to_dot(&self, name: &str) -> String {
        let mut dot = String::new();
        let _ = writeln!(dot, "digraph \"{}\" {{", escape(name));
        let _ = writeln!(dot, "    rankdir=LR;");
        for task in self.tasks {
            let _ = writeln!(
                dot,
                "    \"{}\" [label=\"{}\\n({})\"];",
                escape(&task.id),
                escape(&task.id),
                escape(&task.agent_type)
            );
        }
        for task in self.tasks {
            for dep in &task.depends_on {
                let _ = writeln!(dot, "    \"{}\" -> \"{}\";", escape(dep), escape(&task.id));
            }
        }
        dot.push_str("}\n");
        dot
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
