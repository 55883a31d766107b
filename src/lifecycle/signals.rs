//! OS signal handling.

use tokio::task::JoinHandle;

use crate::resilience::CallContext;

/// Cancel `ctx` when the process receives Ctrl-C.
///
/// The returned task ends on its own once `ctx` is done.
pub fn cancel_on_ctrl_c(ctx: &CallContext) -> JoinHandle<()> {
    let ctx = ctx.clone();

    tokio::spawn(async move {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    tracing::info!("Interrupt received, cancelling pending calls");
                    ctx.cancel();
                }
                Err(e) => tracing::error!(error = %e, "Failed to listen for interrupt signal"),
            },
            _ = ctx.done() => {}
        }
    })
}
