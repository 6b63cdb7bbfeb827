//! Background execution of layout requests. The engine runs on a worker
//! thread; the frame loop polls for the result. A request arriving while a
//! run is in flight is a no-op; there is no cancellation, only the guard.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;

use super::{LayoutEdge, LayoutEngine, LayoutNode, NodePlacement};

type LayoutResult = anyhow::Result<Vec<NodePlacement>>;

pub struct LayoutRunner {
    engine: Arc<dyn LayoutEngine>,
    tx: Sender<LayoutResult>,
    rx: Receiver<LayoutResult>,
    running: bool,
}

impl LayoutRunner {
    pub fn new(engine: Arc<dyn LayoutEngine>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            engine,
            tx,
            rx,
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start a layout run. Returns false (and does nothing) if one is already
    /// in flight or there is nothing to lay out.
    pub fn request(&mut self, nodes: Vec<LayoutNode>, edges: Vec<LayoutEdge>) -> bool {
        if self.running || nodes.is_empty() {
            return false;
        }
        self.running = true;
        let engine = Arc::clone(&self.engine);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let _ = tx.send(engine.compute(&nodes, &edges));
        });
        true
    }

    /// Drain a finished run, clearing the guard so a retry is possible even
    /// after a failure.
    pub fn poll(&mut self) -> Option<LayoutResult> {
        match self.rx.try_recv() {
            Ok(result) => {
                self.running = false;
                Some(result)
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}
