use crate::args::{Arg, Args};
use crate::debug::DebugLevel;
use crate::decode::{AsUnit, ResultDecoder};
use crate::deferred::Deferred;
use crate::dispatch;
use crate::error::{ApiError, ArgumentError};
use crate::request::Assembler;
use crate::response::ApiResponse;
use crate::settings::Settings;
#[cfg(feature = "reqwest")]
use crate::transport::ReqwestTransport;
use crate::transport::Transport;
use restwire_descriptor::descriptor::{DescriptorTable, MethodDescriptor};
use restwire_descriptor::emit::{AssemblyProcedure, emit};
use restwire_descriptor::{ProcedureCache, ProcedureKey};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Runtime behind every generated client: owns the transport, the settings,
/// the descriptor table and the procedure cache.
pub struct RestClient<T: Transport> {
    transport: Arc<T>,
    base_url: Url,
    settings: Settings,
    table: Arc<DescriptorTable>,
    cache: Arc<ProcedureCache>,
}

impl<T: Transport> Clone for RestClient<T> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            base_url: self.base_url.clone(),
            settings: self.settings.clone(),
            table: Arc::clone(&self.table),
            cache: Arc::clone(&self.cache),
        }
    }
}

#[cfg(feature = "reqwest")]
impl RestClient<ReqwestTransport> {
    pub fn reqwest(base_url: Url, table: DescriptorTable) -> Self {
        Self::new(ReqwestTransport::default(), base_url, table)
    }
}

struct Prepared {
    descriptor: Arc<MethodDescriptor>,
    procedure: Arc<AssemblyProcedure>,
}

impl<T: Transport> RestClient<T> {
    pub fn new(transport: T, base_url: Url, table: DescriptorTable) -> Self {
        Self::from_parts(transport, base_url, Settings::default(), Arc::new(table))
    }

    pub fn from_parts(
        transport: T,
        base_url: Url,
        settings: Settings,
        table: Arc<DescriptorTable>,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            base_url,
            settings,
            table,
            cache: Arc::new(ProcedureCache::new()),
        }
    }

    #[inline]
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    #[inline]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[inline]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[inline]
    pub fn table(&self) -> &DescriptorTable {
        &self.table
    }

    #[inline]
    pub fn cache(&self) -> &ProcedureCache {
        &self.cache
    }

    #[inline]
    pub fn debug_level(&self) -> DebugLevel {
        self.settings.debug_level()
    }

    #[inline]
    pub fn set_debug_level(&mut self, level: DebugLevel) {
        self.settings.set_debug_level(level);
    }

    #[inline]
    pub fn with_debug_level(mut self, level: DebugLevel) -> Self {
        self.settings.set_debug_level(level);
        self
    }

    /// Cached procedure for `key`, emitted on first use.
    pub fn procedure(&self, key: &ProcedureKey) -> Result<Arc<AssemblyProcedure>, ApiError> {
        Ok(self.prepare(key)?.procedure)
    }

    fn prepare(&self, key: &ProcedureKey) -> Result<Prepared, ApiError> {
        let descriptor = self
            .table
            .get(&key.method)
            .cloned()
            .ok_or_else(|| ApiError::UnknownMethod(key.to_string()))?;
        let procedure = self.cache.get_or_create(key, || emit(&descriptor));
        Ok(Prepared {
            descriptor,
            procedure,
        })
    }

    fn prepare_for<D: ResultDecoder>(
        &self,
        key: &ProcedureKey,
        envelope: bool,
    ) -> Result<Prepared, ApiError> {
        let p = self.prepare(key)?;
        let plan = &p.procedure.dispatch;
        if plan.target != D::TARGET || plan.envelope != envelope {
            return Err(ApiError::DecoderMismatch {
                method: key.method.to_string(),
                decoder: D::NAME,
            });
        }
        Ok(p)
    }

    /// The declared cancellation argument, if the method has one.
    fn token(&self, p: &Prepared, args: &Args) -> Result<Option<CancellationToken>, ApiError> {
        let Some(index) = p.procedure.dispatch.cancellation else {
            return Ok(None);
        };
        let name = p
            .descriptor
            .parameters
            .get(index)
            .map(|d| d.name.as_str())
            .unwrap_or("");
        match args.require(index, name)? {
            Arg::Cancellation(t) => Ok(Some(t.clone())),
            other => Err(ArgumentError::Kind {
                name: name.to_string(),
                expected: "a cancellation token",
                got: other.kind(),
            }
            .into()),
        }
    }

    fn assemble(&self, p: &Prepared, args: &Args) -> Result<crate::request::AssembledRequest, ApiError> {
        Assembler {
            base: &self.base_url,
            descriptor: &p.descriptor,
            args,
            settings: &self.settings,
        }
        .run(&p.procedure.steps)
    }

    async fn call<D: ResultDecoder>(
        &self,
        p: &Prepared,
        args: &Args,
        token: Option<CancellationToken>,
    ) -> Result<D::Output, ApiError> {
        let req = self.assemble(p, args)?;
        let url = req.url.as_ref().unwrap_or(&self.base_url).to_string();
        let settings = &self.settings;
        let operation = p.descriptor.name.as_str();
        dispatch::cancellable(settings, token.as_ref(), &url, async {
            let mut inbound =
                dispatch::exchange(&*self.transport, settings, &self.base_url, req, operation)
                    .await?;
            if let Some(err) = dispatch::check(settings, &mut inbound).await {
                return Err(err);
            }
            let head = inbound.head.clone();
            let payload = dispatch::decode(settings, inbound, D::TARGET).await?;
            dispatch::finish::<D>(settings, &head, operation, payload)
        })
        .await
    }

    async fn call_envelope<D: ResultDecoder>(
        &self,
        p: &Prepared,
        args: &Args,
        token: Option<CancellationToken>,
    ) -> Result<ApiResponse<D::Output>, ApiError> {
        let req = self.assemble(p, args)?;
        let url = req.url.as_ref().unwrap_or(&self.base_url).to_string();
        let settings = &self.settings;
        let operation = p.descriptor.name.as_str();
        dispatch::cancellable(settings, token.as_ref(), &url, async {
            let mut inbound =
                dispatch::exchange(&*self.transport, settings, &self.base_url, req, operation)
                    .await?;
            let head = inbound.head.clone();
            if let Some(err) = dispatch::check(settings, &mut inbound).await {
                return Ok(ApiResponse::new(head, None, Some(err)));
            }
            let decoded = match dispatch::decode(settings, inbound, D::TARGET).await {
                Ok(payload) => dispatch::finish::<D>(settings, &head, operation, payload),
                Err(e) => Err(e),
            };
            match decoded {
                Ok(v) => Ok(ApiResponse::new(head, Some(v), None)),
                Err(e @ (ApiError::Request(_) | ApiError::Cancelled)) => Err(e),
                Err(e) => Ok(ApiResponse::new(head, None, Some(e))),
            }
        })
        .await
    }

    /// Dispatch once and decode the result with `D`.
    pub async fn invoke<D: ResultDecoder>(
        &self,
        key: &ProcedureKey,
        args: Args,
    ) -> Result<D::Output, ApiError> {
        let p = self.prepare_for::<D>(key, false)?;
        let token = self.token(&p, &args)?;
        self.call::<D>(&p, &args, token).await
    }

    /// Dispatch once, discarding the body.
    pub async fn invoke_unit(&self, key: &ProcedureKey, args: Args) -> Result<(), ApiError> {
        self.invoke::<AsUnit>(key, args).await
    }

    /// Dispatch once; status and decoding failures land in the envelope.
    pub async fn invoke_envelope<D: ResultDecoder>(
        &self,
        key: &ProcedureKey,
        args: Args,
    ) -> Result<ApiResponse<D::Output>, ApiError> {
        let p = self.prepare_for::<D>(key, true)?;
        let token = self.token(&p, &args)?;
        self.call_envelope::<D>(&p, &args, token).await
    }

    /// Cold call: each run dispatches anew under a child of the declared
    /// cancellation token.
    pub fn deferred<D: ResultDecoder + 'static>(
        &self,
        key: &ProcedureKey,
        args: Args,
    ) -> Deferred<D::Output> {
        let client = self.clone();
        let key = key.clone();
        let parent = args.cancellation_token().cloned();
        Deferred::new(parent, move |token| {
            let client = client.clone();
            let key = key.clone();
            let args = args.clone();
            Box::pin(async move {
                let p = client.prepare_for::<D>(&key, false)?;
                client.call::<D>(&p, &args, Some(token)).await
            })
        })
    }

    pub fn deferred_envelope<D: ResultDecoder + 'static>(
        &self,
        key: &ProcedureKey,
        args: Args,
    ) -> Deferred<ApiResponse<D::Output>> {
        let client = self.clone();
        let key = key.clone();
        let parent = args.cancellation_token().cloned();
        Deferred::new(parent, move |token| {
            let client = client.clone();
            let key = key.clone();
            let args = args.clone();
            Box::pin(async move {
                let p = client.prepare_for::<D>(&key, true)?;
                client.call_envelope::<D>(&p, &args, Some(token)).await
            })
        })
    }
}
