//! Locating nodes within a parsed tree.

use std::iter::FusedIterator;

use crate::Tree;
use crate::source_map::Step;

/// Resolves an AST path against a tree.
///
/// Each step narrows to the `index`-th direct child of the current node whose
/// type matches the step, in the order the children appear. An empty path
/// resolves to the root itself.
///
/// Returns `None` if any step has no matching child.
pub fn resolve<'a, T: Tree>(root: &'a T, path: &[Step]) -> Option<&'a T> {
    path.iter().try_fold(root, |node, step| {
        node.children()
            .filter(|child| child.kind() == step.kind())
            .nth(step.index())
    })
}

/// An iterator that performs a pre-order traversal of a tree and yields the
/// nodes matching a predicate.
#[allow(missing_debug_implementations)]
pub struct Dive<'a, T, P> {
    /// The nodes left to visit; the next node is at the end.
    stack: Vec<&'a T>,
    /// The predicate a node must satisfy to be yielded.
    predicate: P,
}

impl<'a, T, P> Iterator for Dive<'a, T, P>
where
    T: Tree,
    P: Fn(&T) -> bool,
{
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.stack.pop() {
            let start = self.stack.len();
            self.stack.extend(node.children());
            // Children are pushed in order, so reverse them to visit the
            // first child next.
            self.stack[start..].reverse();

            if (self.predicate)(node) {
                return Some(node);
            }
        }

        None
    }
}

impl<T, P> FusedIterator for Dive<'_, T, P>
where
    T: Tree,
    P: Fn(&T) -> bool,
{
}

/// Searches the whole tree for nodes matching the predicate.
///
/// Matching nodes are yielded in pre-order.
pub fn dive<T, P>(root: &T, predicate: P) -> Dive<'_, T, P>
where
    T: Tree,
    P: Fn(&T) -> bool,
{
    Dive {
        stack: vec![root],
        predicate,
    }
}
