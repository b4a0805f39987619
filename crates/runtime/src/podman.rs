//! `podman run` command construction.

/// Named volume mounted as the model cache.
pub const CACHE_VOLUME: &str = "reai-cache:/cache";
/// Version of the agent grid expected inside the image.
pub const AGENT_GRID_VERSION: &str = "1.3.1";

const REDACTED: &str = "[REDACTED]";

/// Tuning knobs for the inference server started inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub module: String,
    pub inference_max_length: u32,
    pub max_alloc_timeout: u32,
    pub quant_type: String,
    pub attn_cache_tokens: u32,
    pub throughput: String,
}

impl Default for Workload {
    fn default() -> Self {
        Self {
            module: "agentgrid.cli.run_server".into(),
            inference_max_length: 136_192,
            max_alloc_timeout: 6000,
            quant_type: "nf4".into(),
            attn_cache_tokens: 128_000,
            throughput: "eval".into(),
        }
    }
}

/// Everything needed to build one `podman run` invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub container_name: String,
    pub image: String,
    pub model_name: String,
    pub token: String,
    pub initial_peers: Option<String>,
    pub port: u16,
    pub use_gpu: bool,
    pub workload: Workload,
}

impl std::fmt::Debug for RunSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunSpec")
            .field("container_name", &self.container_name)
            .field("image", &self.image)
            .field("model_name", &self.model_name)
            .field("token", &REDACTED)
            .field("initial_peers", &self.initial_peers)
            .field("port", &self.port)
            .field("use_gpu", &self.use_gpu)
            .finish_non_exhaustive()
    }
}

impl RunSpec {
    /// Arguments for `podman`, starting with `run`.
    pub fn args(&self) -> Vec<String> {
        self.build_args(&self.token)
    }

    /// The command line with the token replaced, safe to log.
    pub fn redacted(&self, program: &str) -> String {
        let mut line = program.to_string();
        for arg in self.build_args(REDACTED) {
            line.push(' ');
            line.push_str(&arg);
        }
        line
    }

    fn build_args(&self, token: &str) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "run".into(),
            "--network=host".into(),
            "--rm".into(),
            format!("--name={}", self.container_name),
            format!("--volume={CACHE_VOLUME}"),
            "--pull=newer".into(),
            format!("--env=AGENT_GRID_VERSION={AGENT_GRID_VERSION}"),
        ];

        if self.use_gpu {
            // Full GPU passthrough needs the privileged, host-IPC container.
            args.extend([
                "--device=nvidia.com/gpu=all".into(),
                "--privileged".into(),
                "--ipc=host".into(),
            ]);
        }

        let w = &self.workload;
        args.extend([
            self.image.clone(),
            "python".into(),
            "-m".into(),
            w.module.clone(),
            "--inference_max_length".into(),
            w.inference_max_length.to_string(),
            "--port".into(),
            self.port.to_string(),
            "--max_alloc_timeout".into(),
            w.max_alloc_timeout.to_string(),
            "--quant_type".into(),
            w.quant_type.clone(),
            "--attn_cache_tokens".into(),
            w.attn_cache_tokens.to_string(),
            self.model_name.clone(),
            "--token".into(),
            token.to_string(),
            "--throughput".into(),
            w.throughput.clone(),
        ]);

        if let Some(peers) = self.initial_peers.as_deref().filter(|p| !p.is_empty()) {
            args.push("--initial_peers".into());
            args.push(peers.to_string());
        }

        args
    }
}
