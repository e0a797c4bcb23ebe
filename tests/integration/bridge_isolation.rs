//! Engine driven directly from several OS threads.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use php_embed_bridge::sapi::{
    Bridge, Engine, Error, Interpreter, NoopCallbacks, RequestContext, Session,
};

/// Writes its thread index and request id, optionally after a pause.
struct TaggingInterpreter;

impl Interpreter for TaggingInterpreter {
    fn startup(&self, _version_hint: &str) -> Result<(), String> {
        Ok(())
    }

    fn shutdown(&self) {}

    fn execute(&self, session: &mut Session<'_>) -> Result<(), String> {
        let id = session
            .server_vars()
            .iter()
            .find(|(k, _)| k == "REQUEST_ID")
            .map(|(_, v)| v.clone())
            .unwrap_or_default();
        if session.script() == "slow.php" {
            thread::sleep(Duration::from_millis(200));
        }
        session
            .add_header(&format!("X-Thread: {}", session.thread_index()))
            .map_err(|e| e.to_string())?;
        session.write(format!("{}:{}", session.thread_index(), id).as_bytes());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "tagging"
    }
}

fn engine() -> Arc<Engine> {
    let engine = Engine::new("8.3", Bridge::with_interpreter(Box::new(TaggingInterpreter))).unwrap();
    engine.startup().unwrap();
    Arc::new(engine)
}

#[test]
fn test_threads_see_only_their_own_context() {
    let engine = engine();
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let mut bodies = Vec::new();
                for n in 0..25 {
                    let mut ctx = RequestContext::new().unwrap();
                    ctx.set_thread_index(i as i32);
                    let id = format!("{}-{}", i, n);
                    ctx.add_server_var("REQUEST_ID", Some(&id)).unwrap();

                    let resp = engine.execute(&mut ctx, "index.php", &NoopCallbacks).unwrap();
                    assert_eq!(resp.header("X-Thread"), Some(i.to_string()));
                    bodies.push(String::from_utf8(resp.body().to_vec()).unwrap());
                    ctx.destroy();
                }
                (i, bodies)
            })
        })
        .collect();

    for handle in handles {
        let (i, bodies) = handle.join().unwrap();
        for (n, body) in bodies.iter().enumerate() {
            assert_eq!(body, &format!("{}:{}-{}", i, i, n));
        }
    }
    assert_eq!(engine.bridge().active_count(), 0);
}

#[test]
fn test_same_index_twice_is_rejected() {
    let engine = engine();

    let busy = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            let mut ctx = RequestContext::new().unwrap();
            ctx.set_thread_index(3);
            engine.execute(&mut ctx, "slow.php", &NoopCallbacks)
        })
    };

    // Wait until the slow script holds index 3
    let mut waited = 0;
    while !engine.bridge().is_active(3) && waited < 100 {
        thread::sleep(Duration::from_millis(5));
        waited += 1;
    }
    assert!(engine.bridge().is_active(3));

    let mut ctx = RequestContext::new().unwrap();
    ctx.set_thread_index(3);
    let err = engine
        .execute(&mut ctx, "index.php", &NoopCallbacks)
        .unwrap_err();
    assert!(matches!(err, Error::ThreadBusy { thread_index: 3 }));
    assert!(err.is_usage());

    // Another index is unaffected
    let mut other = RequestContext::new().unwrap();
    other.set_thread_index(4);
    assert!(engine.execute(&mut other, "index.php", &NoopCallbacks).is_ok());

    let resp = busy.join().unwrap().unwrap();
    assert_eq!(resp.body().as_ref(), b"3:");
    assert!(!engine.bridge().is_active(3));
}

#[test]
fn test_response_outlives_context() {
    let engine = engine();
    let mut ctx = RequestContext::new().unwrap();
    ctx.set_thread_index(1);
    ctx.add_server_var("REQUEST_ID", Some("kept")).unwrap();

    let resp = engine.execute(&mut ctx, "index.php", &NoopCallbacks).unwrap();
    ctx.destroy();
    drop(ctx);

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.body().as_ref(), b"1:kept");
}

#[test]
fn test_execute_after_shutdown() {
    let engine = engine();
    engine.shutdown();

    let mut ctx = RequestContext::new().unwrap();
    let err = engine
        .execute(&mut ctx, "index.php", &NoopCallbacks)
        .unwrap_err();
    assert!(matches!(err, Error::NotStarted));
}
