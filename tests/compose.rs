use std::sync::{Arc, Mutex};

use httpmid::{
    compose, BoxedHandler, BoxedMiddleware, Chain, HeaderValue, Middleware, Request, Response,
    StatusCode,
};

type Trace = Arc<Mutex<Vec<i32>>>;

fn marker(k: i32, trace: Trace) -> impl Middleware + Clone {
    move |next: BoxedHandler| {
        let trace = trace.clone();
        BoxedHandler::new(move |req: Request| {
            let next = next.clone();
            let trace = trace.clone();
            async move {
                trace.lock().unwrap().push(-k);
                let res = next.call(req).await;
                trace.lock().unwrap().push(k);
                res
            }
        })
    }
}

fn terminal(trace: &Trace) -> BoxedHandler {
    let trace = trace.clone();
    BoxedHandler::new(move |_req: Request| {
        let trace = trace.clone();
        async move {
            trace.lock().unwrap().push(0);
            Response::text("done")
        }
    })
}

async fn run(handler: &BoxedHandler, trace: &Trace) -> Vec<i32> {
    let res = handler.call(Request::default()).await;
    assert_eq!(res.body(), b"done");
    std::mem::take(&mut *trace.lock().unwrap())
}

#[tokio::test]
async fn empty_chain_is_identity() {
    let trace = Trace::default();
    let h = terminal(&trace);

    let composed = httpmid::compose!().then(h.clone());

    assert!(composed.ptr_eq(&h));
    assert_eq!(run(&composed, &trace).await, [0]);
}

#[tokio::test]
async fn single_layer_matches_direct_apply() {
    let trace = Trace::default();
    let m = marker(1, trace.clone());

    let composed = httpmid::compose!(m.clone()).then(terminal(&trace));
    let direct = m.then(terminal(&trace));

    assert_eq!(run(&composed, &trace).await, run(&direct, &trace).await);
}

#[tokio::test]
async fn nested_chains_flatten() {
    let trace = Trace::default();
    let (m1, m2, m3) = (marker(1, trace.clone()), marker(2, trace.clone()), marker(3, trace.clone()));

    let nested = httpmid::compose!(httpmid::compose!(m1.clone(), m2.clone()), m3.clone())
        .then(terminal(&trace));
    let right = httpmid::compose!(m1.clone(), httpmid::compose!(m2.clone(), m3.clone()))
        .then(terminal(&trace));
    let flat = httpmid::compose!(m1, m2, m3).then(terminal(&trace));

    let expected = [-1, -2, -3, 0, 3, 2, 1];
    assert_eq!(run(&nested, &trace).await, expected);
    assert_eq!(run(&right, &trace).await, expected);
    assert_eq!(run(&flat, &trace).await, expected);
}

#[tokio::test]
async fn outermost_first_trace() {
    let trace = Trace::default();
    let (m1, m2, m3) = (marker(1, trace.clone()), marker(2, trace.clone()), marker(3, trace.clone()));

    let handler = httpmid::compose!(m1, m2, m3).then(terminal(&trace));

    assert_eq!(run(&handler, &trace).await, [-1, -2, -3, 0, 3, 2, 1]);
}

#[tokio::test]
async fn reordering_changes_the_trace() {
    let trace = Trace::default();
    let (m1, m2, m3) = (marker(1, trace.clone()), marker(2, trace.clone()), marker(3, trace.clone()));

    let handler = httpmid::compose!(m3, m2, m1).then(terminal(&trace));

    assert_eq!(run(&handler, &trace).await, [-3, -2, -1, 0, 1, 2, 3]);
}

#[tokio::test]
async fn composing_twice_yields_equivalent_handlers() {
    let trace = Trace::default();
    let layers: Vec<BoxedMiddleware> = vec![
        Arc::new(marker(1, trace.clone())),
        Arc::new(marker(2, trace.clone())),
    ];

    let first = compose(layers.iter().cloned()).then(terminal(&trace));
    let second = compose(layers.iter().cloned()).then(terminal(&trace));

    let a = run(&first, &trace).await;
    let b = run(&second, &trace).await;
    assert_eq!(a, [-1, -2, 0, 2, 1]);
    assert_eq!(a, b);
    // Invoking again carries nothing over from earlier calls.
    assert_eq!(run(&first, &trace).await, a);
}

#[test]
fn compose_leaves_the_input_untouched() {
    let trace = Trace::default();
    let layers: Vec<BoxedMiddleware> = vec![
        Arc::new(marker(1, trace.clone())),
        Arc::new(marker(2, trace.clone())),
        Arc::new(marker(3, trace.clone())),
    ];
    let before: Vec<BoxedMiddleware> = layers.clone();

    let chain = compose(layers.iter().cloned());
    drop(chain.then(terminal(&trace)));

    assert_eq!(layers.len(), before.len());
    for (now, then) in layers.iter().zip(&before) {
        assert!(Arc::ptr_eq(now, then));
    }
}

#[tokio::test]
async fn chain_outlives_its_source() {
    let trace = Trace::default();
    let chain: Chain = {
        let layers: Vec<BoxedMiddleware> = vec![Arc::new(marker(1, trace.clone()))];
        compose(layers)
    };

    let handler = chain.then(terminal(&trace));
    assert_eq!(run(&handler, &trace).await, [-1, 0, 1]);
}

#[tokio::test]
async fn outer_layer_can_short_circuit() {
    let trace = Trace::default();
    let deny = |_next: BoxedHandler| {
        BoxedHandler::new(|_req: Request| async { StatusCode::UNAUTHORIZED })
    };

    let handler = httpmid::compose!(marker(1, trace.clone()), deny, marker(2, trace.clone()))
        .then(terminal(&trace));
    let res = handler.call(Request::default()).await;

    assert_eq!(res.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(*trace.lock().unwrap(), [-1, 1]);
}

#[tokio::test]
async fn state_flows_through_request_extensions() {
    #[derive(Clone)]
    struct User(&'static str);

    fn authenticate(next: BoxedHandler) -> BoxedHandler {
        BoxedHandler::new(move |mut req: Request| {
            let next = next.clone();
            async move {
                req.extensions_mut().insert(User("alice"));
                next.call(req).await
            }
        })
    }

    let handler = httpmid::compose!(authenticate).then(|req: Request| async move {
        match req.extensions().get::<User>() {
            Some(User(name)) => Response::text(format!("hello {name}")),
            None => Response::status(StatusCode::UNAUTHORIZED),
        }
    });

    let res = handler.call(Request::default()).await;
    assert_eq!(res.body(), b"hello alice");
}

#[tokio::test]
async fn concurrent_invocations_are_independent() {
    fn stamp(next: BoxedHandler) -> BoxedHandler {
        BoxedHandler::new(move |req: Request| {
            let next = next.clone();
            async move {
                let mut res = next.call(req).await;
                res.headers_mut().append("x-stamp", HeaderValue::from_static("1"));
                res
            }
        })
    }

    let handler = httpmid::compose!(stamp, stamp).then(|req: Request| async move {
        tokio::task::yield_now().await;
        Response::text(req.path().to_owned())
    });

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..16 {
        let handler = handler.clone();
        tasks.spawn(async move {
            let req = Request::new(
                http::Request::builder()
                    .uri(format!("/{i}"))
                    .body(bytes::Bytes::new())
                    .unwrap(),
            );
            (i, handler.call(req).await)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        let (i, res) = joined.unwrap();
        assert_eq!(res.body(), format!("/{i}").as_bytes());
        assert_eq!(res.headers().get_all("x-stamp").iter().count(), 2);
    }
}
