//! Aggregate finer bars into coarser ones.

use super::timeframe::Timeframe;
use crate::domain::Bar;

/// Resample a time-ordered series into `target` buckets.
///
/// open = first open, high = max high, low = min low, close = last close,
/// volume = sum. The output bar is stamped at its bucket start. Buckets without
/// bars produce nothing. VWAP is volume-weighted when every sub-bar carries one,
/// otherwise dropped.
///
/// A series already aligned to `target` (one bar per bucket, stamped at the
/// bucket start) comes back unchanged.
pub fn resample(bars: &[Bar], target: Timeframe) -> Vec<Bar> {
    let mut out: Vec<Bar> = Vec::new();
    let mut window: Vec<&Bar> = Vec::new();
    let mut current = None;

    for bar in bars {
        let bucket = target.bucket_start(bar.time);
        if current != Some(bucket) {
            if let Some(start) = current {
                out.push(aggregate(start, &window));
            }
            window.clear();
            current = Some(bucket);
        }
        window.push(bar);
    }
    if let Some(start) = current {
        out.push(aggregate(start, &window));
    }
    out
}

fn aggregate(start: chrono::DateTime<chrono::Utc>, window: &[&Bar]) -> Bar {
    let first = window[0];
    let last = window[window.len() - 1];
    let volume: u64 = window.iter().map(|b| b.volume).sum();
    let vwap = if window.len() == 1 {
        first.vwap
    } else {
        weighted_vwap(window, volume)
    };
    Bar {
        time: start,
        open: first.open,
        high: window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max),
        low: window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min),
        close: last.close,
        volume,
        vwap,
    }
}

fn weighted_vwap(window: &[&Bar], volume: u64) -> Option<f64> {
    if volume == 0 {
        return None;
    }
    let mut notional = 0.0;
    for bar in window {
        notional += bar.vwap? * bar.volume as f64;
    }
    Some(notional / volume as f64)
}
