/*!
 * Shared test helpers
 */
#![allow(dead_code)]

use std::sync::Arc;
use tiny_os_kernel::{task, ExitCode, Kernel, KernelConfig};

/// Boot a kernel with `init` as the init task and return it together with
/// init's exit status. The kernel outlives boot so tests can inspect the
/// leftover state.
pub fn boot_kernel<F>(config: KernelConfig, init: F) -> (Arc<Kernel>, ExitCode)
where
    F: Fn(&Kernel, &[u8]) -> ExitCode + Send + Sync + 'static,
{
    let _ = env_logger::builder().is_test(true).try_init();
    let kernel = Kernel::new(config);
    let status = kernel.boot(task(init), &[]);
    (kernel, status)
}

/// Boot with defaults and return only the exit status.
pub fn boot<F>(init: F) -> ExitCode
where
    F: Fn(&Kernel, &[u8]) -> ExitCode + Send + Sync + 'static,
{
    boot_kernel(KernelConfig::default(), init).1
}
