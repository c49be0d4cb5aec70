use std::marker::PhantomData;

use crate::any::{boxed, downcast};
use crate::node::{build_flat_map, build_map, FlatMapFn, MapFn, Node};
use crate::source::{erase, erase_batched, BatchedSource, DataSource};

/// A composable plan for a value of type `T`, built from [`value`], [`map`],
/// [`flat_map`], [`collect`], [`traverse`], [`source`] and [`batched_source`].
/// Evaluate it with [`crate::run::execute`], [`crate::run::run`] or
/// [`crate::run::run_blocking`].
pub struct Muse<T> {
    pub(crate) node: Node,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Muse<T> {
    pub(crate) fn from_node(node: Node) -> Self {
        Muse {
            node,
            _marker: PhantomData,
        }
    }
}

/// Lifts a plain value into a plan that requires no fetches (law: "value
/// purity").
pub fn value<T: Send + Sync + 'static>(v: T) -> Muse<T> {
    Muse::from_node(Node::Done(boxed(v)))
}

/// Transforms the eventual value of `m` with `f`. Fuses with `m`'s existing
/// shape at construction time rather than always nesting a new `Map` node
/// (see `DESIGN.md`).
pub fn map<T, U, F>(m: Muse<T>, f: F) -> Muse<U>
where
    T: 'static,
    U: Send + Sync + 'static,
    F: FnOnce(T) -> U + Send + 'static,
{
    let f: MapFn = Box::new(move |mut values| {
        let v = downcast::<T>(values.pop().expect("single-child Map"));
        boxed(f(v))
    });
    Muse::from_node(build_map(vec![m.node], f))
}

/// Transforms the eventual value of `m` into a further plan, which is then
/// evaluated in turn. Unlike `map`, `f`'s result may introduce a new
/// evaluator level (e.g. a source whose identity depends on `m`'s value).
pub fn flat_map<T, U, F>(m: Muse<T>, f: F) -> Muse<U>
where
    T: 'static,
    U: Send + Sync + 'static,
    F: FnOnce(T) -> Muse<U> + Send + 'static,
{
    let f: FlatMapFn = Box::new(move |mut values| {
        let v = downcast::<T>(values.pop().expect("single-child FlatMap"));
        f(v).node
    });
    Muse::from_node(build_flat_map(vec![m.node], f))
}

/// Combines a list of plans into a plan of a list, preserving input order
/// regardless of the order in which any underlying fetches resolve.
pub fn collect<T: Send + Sync + 'static>(plans: Vec<Muse<T>>) -> Muse<Vec<T>> {
    if plans.is_empty() {
        return value(Vec::new());
    }
    let children: Vec<Node> = plans.into_iter().map(|m| m.node).collect();
    let f: MapFn = Box::new(move |values| {
        boxed(values.into_iter().map(downcast::<T>).collect::<Vec<T>>())
    });
    Muse::from_node(build_map(children, f))
}

/// Applies `f` to every element of `items` and collects the resulting
/// plans into a plan of a list, in input order.
pub fn traverse<T, U, F>(items: Vec<T>, f: F) -> Muse<Vec<U>>
where
    U: Send + Sync + 'static,
    F: Fn(T) -> Muse<U>,
{
    collect(items.into_iter().map(f).collect())
}

/// Enters a plain [`DataSource`] request into a plan. Its kind is
/// dispatched by firing one `fetch` per outstanding identity at each level.
pub fn source<S: DataSource>(s: S) -> Muse<S::Response> {
    Muse::from_node(Node::Source(erase(s)))
}

/// Enters a [`BatchedSource`] request into a plan. Its kind is dispatched
/// through a single `fetch_multi` call per level, provided every sibling
/// request of the same kind in that level was also entered this way.
pub fn batched_source<S: BatchedSource>(s: S) -> Muse<S::Response> {
    Muse::from_node(Node::Source(erase_batched(s)))
}

pub(crate) fn into_node<T>(m: Muse<T>) -> Node {
    m.node
}
