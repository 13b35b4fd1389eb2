//! Recursion detection (spec.md §4.1): strongly-connected components of
//! the direct-call graph. Any function in a non-singleton SCC, or a
//! singleton SCC with a self-edge, is marked `requires_context = true`.
//! Implemented with Tarjan's algorithm since the call graph is small
//! and built once per module, matching the "single pass through the
//! pipeline per compilation unit" budget of spec.md §2.

use std::collections::HashMap;

pub struct CallGraph {
    /// index -> outgoing direct-call edges by callee index
    edges: Vec<Vec<usize>>,
    names: Vec<String>,
    index_of: HashMap<String, usize>,
}

impl CallGraph {
    pub fn new(function_names: &[String]) -> Self {
        let index_of = function_names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        CallGraph {
            edges: vec![Vec::new(); function_names.len()],
            names: function_names.to_vec(),
            index_of,
        }
    }

    pub fn add_call(&mut self, caller: &str, callee: &str) {
        let Some(&from) = self.index_of.get(caller) else { return };
        let Some(&to) = self.index_of.get(callee) else { return };
        self.edges[from].push(to);
    }

    /// Returns the set of function names whose `requires_context` flag
    /// (spec.md §4.1) must be set.
    pub fn requires_context(&self) -> Vec<String> {
        let sccs = tarjan_sccs(&self.edges);
        let mut result = Vec::new();
        for scc in &sccs {
            let is_self_recursive_singleton =
                scc.len() == 1 && self.edges[scc[0]].contains(&scc[0]);
            if scc.len() > 1 || is_self_recursive_singleton {
                for &idx in scc {
                    result.push(self.names[idx].clone());
                }
            }
        }
        result
    }
}

/// Tarjan's strongly-connected-components algorithm, iterative over
/// `edges[i]` = outgoing edges of node `i`. Returns components in no
/// particular order.
fn tarjan_sccs(edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    struct State {
        index: Vec<Option<u32>>,
        lowlink: Vec<u32>,
        on_stack: Vec<bool>,
        stack: Vec<usize>,
        counter: u32,
        sccs: Vec<Vec<usize>>,
    }

    fn strongconnect(v: usize, edges: &[Vec<usize>], st: &mut State) {
        st.index[v] = Some(st.counter);
        st.lowlink[v] = st.counter;
        st.counter += 1;
        st.stack.push(v);
        st.on_stack[v] = true;

        for &w in &edges[v] {
            if st.index[w].is_none() {
                strongconnect(w, edges, st);
                st.lowlink[v] = st.lowlink[v].min(st.lowlink[w]);
            } else if st.on_stack[w] {
                st.lowlink[v] = st.lowlink[v].min(st.index[w].unwrap());
            }
        }

        if st.lowlink[v] == st.index[v].unwrap() {
            let mut component = Vec::new();
            loop {
                let w = st.stack.pop().unwrap();
                st.on_stack[w] = false;
                component.push(w);
                if w == v {
                    break;
                }
            }
            st.sccs.push(component);
        }
    }

    let n = edges.len();
    let mut st = State {
        index: vec![None; n],
        lowlink: vec![0; n],
        on_stack: vec![false; n],
        stack: Vec::new(),
        counter: 0,
        sccs: Vec::new(),
    };
    for v in 0..n {
        if st.index[v].is_none() {
            strongconnect(v, edges, &mut st);
        }
    }
    st.sccs
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn direct_self_recursion_requires_context() {
        let names = vec!["fib".to_string(), "main".to_string()];
        let mut graph = CallGraph::new(&names);
        graph.add_call("fib", "fib");
        graph.add_call("main", "fib");

        let mut flagged = graph.requires_context();
        flagged.sort();
        assert_eq!(flagged, vec!["fib".to_string()]);
    }

    #[test]
    fn mutual_recursion_flags_both() {
        let names = vec!["a".to_string(), "b".to_string()];
        let mut graph = CallGraph::new(&names);
        graph.add_call("a", "b");
        graph.add_call("b", "a");

        let mut flagged = graph.requires_context();
        flagged.sort();
        assert_eq!(flagged, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn non_recursive_call_is_unflagged() {
        let names = vec!["add".to_string(), "main".to_string()];
        let mut graph = CallGraph::new(&names);
        graph.add_call("main", "add");
        assert!(graph.requires_context().is_empty());
    }
}
