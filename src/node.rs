use crate::any::AnyValue;
use crate::cache::Cache;
use crate::source::ArcSource;

pub(crate) type MapFn = Box<dyn FnOnce(Vec<AnyValue>) -> AnyValue + Send>;
pub(crate) type FlatMapFn = Box<dyn FnOnce(Vec<AnyValue>) -> Node + Send>;

/// The untyped plan AST. [`crate::Muse<T>`] is a thin, statically-typed
/// handle around one of these.
pub(crate) enum Node {
    Done(AnyValue),
    Value(Box<Node>),
    Map(MapFn, Vec<Node>),
    FlatMap(FlatMapFn, Vec<Node>),
    Source(ArcSource),
}

/// Builds a `Map` node over `children`, fusing `f` into the sole child's
/// existing shape when there is exactly one (composing closures instead of
/// nesting nodes, and applying `f` eagerly when that child is already
/// `Done`). Matches the "composition" and "value purity" laws regardless of
/// whether the caller went through the single-plan or list-valued entry
/// point.
pub(crate) fn build_map(children: Vec<Node>, f: MapFn) -> Node {
    if children.len() != 1 {
        return Node::Map(f, children);
    }
    match children.into_iter().next().unwrap() {
        Node::Done(v) => Node::Done(f(vec![v])),
        Node::Value(inner) => Node::Map(f, vec![*inner]),
        Node::Map(g, gs) => Node::Map(compose_map_map(g, f), gs),
        Node::FlatMap(g, gs) => Node::FlatMap(compose_flatmap_map(g, f), gs),
        source @ Node::Source(_) => Node::Map(f, vec![source]),
    }
}

/// Builds a `FlatMap` node, with the same single-child fusion as
/// [`build_map`]. A `Done` child is resolved immediately: since `f` is a
/// pure function of already-known values, there is nothing to gain by
/// waiting for a future evaluator pass to do it.
pub(crate) fn build_flat_map(children: Vec<Node>, f: FlatMapFn) -> Node {
    if children.len() != 1 {
        return Node::FlatMap(f, children);
    }
    match children.into_iter().next().unwrap() {
        Node::Done(v) => f(vec![v]),
        Node::Value(inner) => Node::FlatMap(f, vec![*inner]),
        Node::Map(g, gs) => Node::FlatMap(compose_map_flatmap(g, f), gs),
        Node::FlatMap(g, gs) => Node::FlatMap(compose_flatmap_flatmap(g, f), gs),
        source @ Node::Source(_) => Node::FlatMap(f, vec![source]),
    }
}

fn compose_map_map(g: MapFn, f: MapFn) -> MapFn {
    Box::new(move |vals| f(vec![g(vals)]))
}

fn compose_flatmap_map(g: FlatMapFn, f: MapFn) -> FlatMapFn {
    Box::new(move |vals| build_map(vec![g(vals)], f))
}

fn compose_map_flatmap(g: MapFn, f: FlatMapFn) -> FlatMapFn {
    Box::new(move |vals| f(vec![g(vals)]))
}

fn compose_flatmap_flatmap(g: FlatMapFn, f: FlatMapFn) -> FlatMapFn {
    Box::new(move |vals| build_flat_map(vec![g(vals)], f))
}

/// One top-down rewrite pass: resolves cache hits to `Done`, reduces
/// `Map`/`FlatMap` nodes whose children are all `Done`, and recurses into a
/// `FlatMap`'s freshly produced continuation. Returns the rewritten node
/// together with every still-outstanding `Source` reachable through it.
pub(crate) fn inject(node: Node, cache: &Cache) -> (Node, Vec<ArcSource>) {
    match node {
        Node::Done(v) => (Node::Done(v), Vec::new()),

        Node::Value(inner) => {
            let (injected, frontier) = inject(*inner, cache);
            match injected {
                Node::Done(v) => (Node::Done(v), frontier),
                other => (Node::Value(Box::new(other)), frontier),
            }
        }

        Node::Map(f, children) => {
            let (injected_children, frontier, all_done) = inject_children(children, cache);
            if all_done {
                (Node::Done(f(take_values(injected_children))), frontier)
            } else {
                (Node::Map(f, injected_children), frontier)
            }
        }

        Node::FlatMap(f, children) => {
            let (injected_children, mut frontier, all_done) = inject_children(children, cache);
            if all_done {
                let continuation = f(take_values(injected_children));
                let (injected_cont, cont_frontier) = inject(continuation, cache);
                frontier.extend(cont_frontier);
                (injected_cont, frontier)
            } else {
                (Node::FlatMap(f, injected_children), frontier)
            }
        }

        Node::Source(request) => {
            let id = request.identity();
            match cache.lookup(request.kind(), &id) {
                Some(cached) => (Node::Done(request.clone_response(&cached)), Vec::new()),
                None => (Node::Source(request.clone()), vec![request]),
            }
        }
    }
}

fn inject_children(children: Vec<Node>, cache: &Cache) -> (Vec<Node>, Vec<ArcSource>, bool) {
    let mut injected = Vec::with_capacity(children.len());
    let mut frontier = Vec::new();
    let mut all_done = true;
    for child in children {
        let (c, fr) = inject(child, cache);
        if !matches!(c, Node::Done(_)) {
            all_done = false;
        }
        frontier.extend(fr);
        injected.push(c);
    }
    (injected, frontier, all_done)
}

fn take_values(children: Vec<Node>) -> Vec<AnyValue> {
    children
        .into_iter()
        .map(|c| match c {
            Node::Done(v) => v,
            _ => unreachable!("muse: inject_children guarantees every child is Done here"),
        })
        .collect()
}
