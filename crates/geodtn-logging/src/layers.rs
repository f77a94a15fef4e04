//! Custom tracing layers

use tracing::{Subscriber, span};
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::context::{HostContextData, HostContextGuard};

/// Layer that attaches the active host context to new spans
///
/// Spans opened while a [`HostContextGuard`] is alive carry a
/// [`HostContextExtension`], which later layers can read back from the
/// span's extensions.
#[derive(Debug, Default)]
pub struct HostContextLayer;

impl HostContextLayer {
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone, Copy)]
pub struct HostContextExtension {
    pub data: HostContextData,
}

impl<S> Layer<S> for HostContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id)
            && let Some(host_ctx) = HostContextGuard::current()
        {
            span.extensions_mut()
                .insert(HostContextExtension { data: host_ctx });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use geodtn_core::HostId;
    use tracing_subscriber::{Registry, layer::SubscriberExt};

    use super::*;

    /// Records the host extension found on every new span
    struct SpanRecorder(Arc<Mutex<Vec<Option<HostId>>>>);

    impl<S> Layer<S> for SpanRecorder
    where
        S: Subscriber + for<'lookup> LookupSpan<'lookup>,
    {
        fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
            let host = ctx.span(id).and_then(|span| {
                span.extensions()
                    .get::<HostContextExtension>()
                    .map(|ext| ext.data.host)
            });
            self.0.lock().unwrap().push(host);
        }
    }

    #[test]
    fn test_spans_carry_host_context() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscriber = Registry::default()
            .with(HostContextLayer::new())
            .with(SpanRecorder(Arc::clone(&seen)));

        tracing::subscriber::with_default(subscriber, || {
            let _outside = tracing::info_span!("outside").entered();
            let _guard = HostContextGuard::new(HostId(2));
            let _inside = tracing::info_span!("inside").entered();
        });

        assert_eq!(*seen.lock().unwrap(), vec![None, Some(HostId(2))]);
    }
}
