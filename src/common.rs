// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use log::warn;

/// Raises the calling thread to the real-time FIFO scheduler. Failure,
/// typically missing CAP_SYS_NICE, only degrades burst timing.
#[cfg(target_os = "linux")]
pub fn set_thread_priority(name: &str) {
    let mut param = libc::sched_param { sched_priority: 10 };
    let pid = unsafe { libc::pthread_self() };
    let err = unsafe {
        libc::pthread_setschedparam(pid, libc::SCHED_FIFO, &mut param as *mut libc::sched_param)
    };
    if err != 0 {
        let err = std::io::Error::from_raw_os_error(err);
        warn!("unable to set {} real-time fifo scheduler: {}", name, err);
    }
}

#[cfg(not(target_os = "linux"))]
pub fn set_thread_priority(_name: &str) {}

/// Monotonic clock in microseconds, unaffected by NTP adjustments.
#[cfg(target_os = "linux")]
pub fn monotonic_us() -> u64 {
    let mut tp = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    let err = unsafe { libc::clock_gettime(libc::CLOCK_MONOTONIC_RAW, &mut tp) };
    if err != 0 {
        warn!("clock_gettime failed: {}", std::io::Error::last_os_error());
        return 0;
    }

    tp.tv_sec as u64 * 1_000_000 + tp.tv_nsec as u64 / 1_000
}

#[cfg(not(target_os = "linux"))]
pub fn monotonic_us() -> u64 {
    use std::{sync::OnceLock, time::Instant};

    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic() {
        let a = monotonic_us();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = monotonic_us();
        assert!(b >= a + 1000);
    }
}
