//! Fan-in stage: forward many input channels into one output channel.

use crossbeam_channel::{Receiver, Sender, bounded, select};
use log::{debug, warn};
use std::thread::{self, JoinHandle};

use super::cancel::CancelToken;

/// Merged stream plus the closer thread that ends it.
pub struct Merged<T> {
    pub output: Receiver<T>,
    /// Joins once every forwarder has returned and the output has been closed.
    pub closer: JoinHandle<()>,
}

/// Merge `inputs` into a single channel of capacity `channel_cap`.
///
/// One forwarder thread per input copies values until its input disconnects or `cancel`
/// fires. The closer thread joins every forwarder before dropping the last sender, so the
/// output disconnects only after all inputs are accounted for. Order across inputs is
/// unspecified.
pub fn merge<T>(inputs: Vec<Receiver<T>>, cancel: &CancelToken, channel_cap: usize) -> Merged<T>
where
    T: Send + 'static,
{
    let (out_tx, output) = bounded::<T>(channel_cap);
    let forwarders: Vec<JoinHandle<usize>> = inputs
        .into_iter()
        .map(|input| {
            let out_tx = out_tx.clone();
            let cancel = cancel.clone();
            thread::spawn(move || forward(input, out_tx, cancel))
        })
        .collect();
    debug!("merge: {} forwarders", forwarders.len());

    let closer = thread::spawn(move || {
        let mut forwarded = 0_usize;
        for h in forwarders {
            match h.join() {
                Ok(n) => forwarded += n,
                Err(_) => warn!("merge forwarder panicked"),
            }
        }
        debug!("merge: all forwarders done, {} values; closing output", forwarded);
        drop(out_tx);
    });

    Merged { output, closer }
}

fn forward<T>(input: Receiver<T>, out_tx: Sender<T>, cancel: CancelToken) -> usize {
    let mut n = 0_usize;
    loop {
        let value = select! {
            recv(input) -> msg => match msg {
                Ok(v) => v,
                Err(_) => break,
            },
            recv(cancel.done()) -> _ => break,
        };
        select! {
            send(out_tx, value) -> res => {
                if res.is_err() {
                    break;
                }
                n += 1;
            }
            recv(cancel.done()) -> _ => break,
        }
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn source(values: Vec<u32>) -> Receiver<u32> {
        let (tx, rx) = bounded(0);
        thread::spawn(move || {
            for v in values {
                if tx.send(v).is_err() {
                    break;
                }
            }
        });
        rx
    }

    #[test]
    fn test_merge_forwards_everything_then_closes() {
        let cancel = CancelToken::new();
        let merged = merge(
            vec![source(vec![1, 2, 3]), source(vec![10, 20]), source(vec![])],
            &cancel,
            4,
        );
        let mut got: Vec<u32> = merged.output.iter().collect();
        got.sort_unstable();
        assert_eq!(got, vec![1, 2, 3, 10, 20]);
        merged.closer.join().unwrap();
    }

    #[test]
    fn test_merge_no_inputs_closes_immediately() {
        let cancel = CancelToken::new();
        let merged = merge(Vec::<Receiver<u32>>::new(), &cancel, 1);
        assert!(merged.output.recv_timeout(Duration::from_secs(2)).is_err());
        merged.closer.join().unwrap();
    }

    #[test]
    fn test_cancel_releases_blocked_forwarders() {
        let cancel = CancelToken::new();
        // Inputs that never close: only cancellation can end the forwarders.
        let (tx_a, rx_a) = bounded::<u32>(1);
        let (tx_b, rx_b) = bounded::<u32>(1);
        tx_a.send(1).unwrap();
        tx_b.send(2).unwrap();
        let merged = merge(vec![rx_a, rx_b], &cancel, 0);
        assert!(merged.output.recv_timeout(Duration::from_secs(2)).is_ok());
        cancel.cancel();

        let (done_tx, done_rx) = bounded(1);
        thread::spawn(move || {
            let _ = merged.closer.join();
            let _ = done_tx.send(());
        });
        assert!(done_rx.recv_timeout(Duration::from_secs(2)).is_ok());
        drop((tx_a, tx_b));
    }
}
