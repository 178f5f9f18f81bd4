use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::scope;

use anyhow::Context;
use flakeid::{Epoch, SnowflakeGenerator, SnowflakeId, TimeSource};

use crate::config::GenerateConfig;

/// Builds the generator described by `config`.
pub fn build_generator(config: &GenerateConfig) -> SnowflakeGenerator {
    match config.node {
        Some(node) => SnowflakeGenerator::with_node(config.epoch, node),
        None => SnowflakeGenerator::with_epoch(config.epoch),
    }
}

/// Generates `config.count` IDs from `config.threads` threads sharing
/// `generator` and writes them to `out` in ascending order.
///
/// Stops at the first error: the failing thread raises a shared flag and the
/// other threads finish the call in flight, then stop. A fatal error (the
/// clock moved backwards) means nothing generated afterwards could be
/// trusted, so nothing is written.
pub fn generate<T, W>(
    generator: &SnowflakeGenerator<T>,
    config: &GenerateConfig,
    out: &mut W,
) -> anyhow::Result<()>
where
    T: TimeSource + Sync,
    W: Write,
{
    let per_thread = config.count / config.threads;
    let remainder = config.count % config.threads;

    let stop = AtomicBool::new(false);
    let stop = &stop;

    let batches = scope(|s| {
        let handles: Vec<_> = (0..config.threads)
            .map(|i| {
                let share = per_thread + usize::from(i < remainder);
                s.spawn(move || {
                    let mut ids = Vec::with_capacity(share);
                    for _ in 0..share {
                        if stop.load(Ordering::Relaxed) {
                            break;
                        }
                        match generator.try_next_id() {
                            Ok(id) => ids.push(id),
                            Err(e) => {
                                stop.store(true, Ordering::Relaxed);
                                return Err(e);
                            }
                        }
                    }
                    Ok(ids)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .map_err(|_| anyhow::anyhow!("generator thread panicked"))?
                    .context("refusing to continue generating ids")
            })
            .collect::<anyhow::Result<Vec<_>>>()
    })?;

    let mut ids: Vec<SnowflakeId> = batches.into_iter().flatten().collect();
    ids.sort_unstable();
    tracing::debug!(count = ids.len(), threads = config.threads, "generated ids");

    for id in &ids {
        if config.explain {
            writeln!(out, "{}", explain(*id, config.epoch)?)?;
        } else {
            writeln!(out, "{id}")?;
        }
    }
    out.flush()?;
    Ok(())
}

/// Writes the fields of each ID in `ids`, decoded against `epoch`.
pub fn decode<W: Write>(ids: &[SnowflakeId], epoch: Epoch, out: &mut W) -> anyhow::Result<()> {
    for id in ids {
        writeln!(out, "{}", explain(*id, epoch)?)?;
    }
    out.flush()?;
    Ok(())
}

fn explain(id: SnowflakeId, epoch: Epoch) -> anyhow::Result<String> {
    let unix_ms = id.unix_millis(epoch).with_context(|| {
        format!(
            "ID {id} cannot be decoded against epoch {} ms",
            epoch.as_millis()
        )
    })?;
    Ok(format!(
        "{id}\tunix_ms={unix_ms} elapsed_ms={} group={} worker={} sequence={}",
        id.timestamp(),
        id.group_id(),
        id.worker_id(),
        id.sequence(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flakeid::{CUSTOM_EPOCH, Error, NodeId};
    use std::sync::Arc;
    use std::sync::atomic::AtomicU64;

    struct FixedTime(u64);

    impl TimeSource for FixedTime {
        fn current_millis(&self) -> u64 {
            self.0
        }
    }

    fn config(count: usize, threads: usize, explain: bool) -> GenerateConfig {
        GenerateConfig {
            epoch: CUSTOM_EPOCH,
            node: Some(NodeId::new(3, 7)),
            count,
            threads,
            explain,
            describe: false,
        }
    }

    #[test]
    fn writes_count_ids_in_order_across_threads() {
        let config = config(1_003, 4, false);
        let generator = build_generator(&config);
        let mut out = Vec::new();
        generate(&generator, &config, &mut out).unwrap();

        let ids: Vec<u64> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| line.parse().unwrap())
            .collect();
        assert_eq!(ids.len(), 1_003);
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        for raw in ids {
            let id = SnowflakeId::from_raw(raw);
            assert_eq!((id.group_id(), id.worker_id()), (3, 7));
        }
    }

    #[test]
    fn explain_prints_fields() {
        let config = config(1, 1, true);
        let generator = SnowflakeGenerator::with_time(
            config.epoch,
            NodeId::new(3, 7),
            FixedTime(CUSTOM_EPOCH.as_millis() + 42),
        );
        let mut out = Vec::new();
        generate(&generator, &config, &mut out).unwrap();

        let expected = SnowflakeId::from_components(42, 3, 7, 0);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!(
                "{expected}\tunix_ms={} elapsed_ms=42 group=3 worker=7 sequence=0\n",
                CUSTOM_EPOCH.as_millis() + 42
            )
        );
    }

    #[test]
    fn clock_errors_stop_generation() {
        let config = config(2, 1, false);
        let generator =
            SnowflakeGenerator::with_time(config.epoch, NodeId::new(3, 7), FixedTime(0));
        let mut out = Vec::new();
        let err = generate(&generator, &config, &mut out).unwrap_err();

        let cause = err.downcast_ref::<Error>().unwrap();
        assert!(cause.is_fatal());
        assert!(out.is_empty());
    }

    /// Fails exactly one read (the `fail_at`th) by reporting a time before
    /// the epoch. Every other read moves forward by one millisecond.
    struct FailOnce {
        reads: Arc<AtomicU64>,
        fail_at: u64,
    }

    impl TimeSource for FailOnce {
        fn current_millis(&self) -> u64 {
            let n = self.reads.fetch_add(1, Ordering::SeqCst);
            if n == self.fail_at {
                0
            } else {
                CUSTOM_EPOCH.as_millis() + n
            }
        }
    }

    #[test]
    fn first_error_stops_sibling_threads() {
        const COUNT: usize = 1_000_000;
        let config = config(COUNT, 4, false);
        let reads = Arc::new(AtomicU64::new(0));
        let generator = SnowflakeGenerator::with_time(
            config.epoch,
            NodeId::new(3, 7),
            FailOnce {
                reads: Arc::clone(&reads),
                fail_at: 100,
            },
        );
        let mut out = Vec::new();
        let err = generate(&generator, &config, &mut out).unwrap_err();

        assert!(err.downcast_ref::<Error>().is_some_and(Error::is_fatal));
        assert!(out.is_empty());
        // Only one call fails, so without the flag the siblings would read
        // the clock for every remaining ID
        let reads = reads.load(Ordering::SeqCst);
        assert!(reads < COUNT as u64 / 2, "{reads} clock reads");
    }

    #[test]
    fn decode_matches_explain() {
        let id = SnowflakeId::from_components(1_500, 1, 2, 3);
        let mut out = Vec::new();
        decode(&[id], Epoch::from_unix_millis(1_000), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{id}\tunix_ms=2500 elapsed_ms=1500 group=1 worker=2 sequence=3\n")
        );
    }

    #[test]
    fn decode_at_the_largest_epoch() {
        let id = SnowflakeId::from_components(SnowflakeId::max_timestamp(), 0, 0, 0);
        let epoch = Epoch::from_unix_millis(u64::MAX - SnowflakeId::TIMESTAMP_MASK);
        let mut out = Vec::new();
        decode(&[id], epoch, &mut out).unwrap();
        assert!(
            String::from_utf8(out)
                .unwrap()
                .contains(&format!("unix_ms={}", u64::MAX))
        );

        let mut out = Vec::new();
        let err = decode(&[id], Epoch::from_unix_millis(u64::MAX), &mut out).unwrap_err();
        assert!(err.to_string().contains("cannot be decoded"));
        assert!(out.is_empty());
    }
}
