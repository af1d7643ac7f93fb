// Copyright (c) 2024 Mike Tsao. All rights reserved.

use crate::channel_pair::ChannelPair;
use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use trackwave_core::transition::TransitionScheduler;

/// The app sends [TransitionServiceInput] messages to control the service.
#[derive(Debug)]
pub enum TransitionServiceInput {
    #[allow(missing_docs)]
    Quit,
}

/// Advances a shared [TransitionScheduler] on its own fast tick, independent
/// of the slow poll loop. The control loop only starts transitions; this
/// service is the only thing that advances them.
#[derive(Debug)]
pub struct TransitionService {
    inputs: ChannelPair<TransitionServiceInput>,
    scheduler: Arc<Mutex<TransitionScheduler>>,
}
impl TransitionService {
    /// Sweeps look smooth at this rate while costing little.
    pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

    /// Creates a new [TransitionService] and starts ticking.
    pub fn new_with(tick: Duration) -> Self {
        let r = Self {
            inputs: Default::default(),
            scheduler: Default::default(),
        };
        r.spawn_thread(tick);
        r
    }

    /// The scheduler this service drives. Start transitions on it.
    pub fn scheduler(&self) -> Arc<Mutex<TransitionScheduler>> {
        Arc::clone(&self.scheduler)
    }

    fn spawn_thread(&self, tick: Duration) {
        let input_receiver = self.inputs.receiver.clone();
        let scheduler = Arc::clone(&self.scheduler);
        std::thread::spawn(move || {
            let ticker = crossbeam_channel::tick(tick);
            loop {
                crossbeam_channel::select! {
                    recv(ticker) -> _ => {
                        if let Ok(mut scheduler) = scheduler.lock() {
                            scheduler.update(Instant::now());
                        }
                    }
                    recv(input_receiver) -> input => match input {
                        Ok(TransitionServiceInput::Quit) | Err(_) => break,
                    }
                }
            }
            log::debug!("TransitionService exit");
        });
    }

    /// Stops ticking. In-flight transitions are abandoned, not completed.
    pub fn exit(&self) {
        let _ = self.inputs.sender.send(TransitionServiceInput::Quit);
    }
}
