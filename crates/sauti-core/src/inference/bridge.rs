//! Bridge to the Python worker hosting the pretrained Bark model.
//!
//! The worker is a long-lived process listening on a Unix socket. Every call opens a
//! connection and exchanges one request frame and one response frame, each a 4-byte
//! big-endian length followed by JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::device::{AcceleratorInfo, Device};
use crate::error::{Error, Result};
use crate::inference::generation::GenerationOptions;
use crate::tensor::{ModelInputs, Tensor, WireTensor};

/// Largest frame accepted from the worker (1 GiB)
const MAX_FRAME_BYTES: usize = 1 << 30;

/// Request to the worker
#[derive(Debug, Default, Serialize)]
pub struct WorkerRequest {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inputs: Option<BTreeMap<String, WireTensor>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub do_sample: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inference_mode: Option<bool>,
}

impl WorkerRequest {
    fn command(name: &str) -> Self {
        Self {
            command: name.to_string(),
            ..Default::default()
        }
    }
}

/// Response from the worker
#[derive(Debug, Default, Deserialize)]
pub struct WorkerResponse {
    pub status: Option<String>,
    pub error: Option<String>,
    /// Failure class: `load`, `generate` or `preset`
    pub kind: Option<String>,
    pub audio: Option<WireTensor>,
    pub accelerators: Option<AcceleratorInfo>,
    pub device: Option<String>,
    #[serde(default)]
    pub model_loaded: bool,
}

/// Worker health as reported by `status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    pub device: Option<String>,
    pub model_loaded: bool,
}

pub struct WorkerBridge {
    socket_path: PathBuf,
    script_path: PathBuf,
    python_cmd: String,
    startup_timeout: Duration,
    process: Mutex<Option<Child>>,
    /// Workers started so far. A model loaded under one epoch is gone in the next.
    epoch: AtomicU64,
}

impl WorkerBridge {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            socket_path: config.socket_path.clone(),
            script_path: config.worker_script.clone(),
            python_cmd: config.python_cmd.clone(),
            startup_timeout: Duration::from_secs(config.worker_startup_timeout_secs),
            process: Mutex::new(None),
            epoch: AtomicU64::new(0),
        }
    }

    /// Identifies the worker currently serving the socket.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Start the worker unless one already answers on the socket.
    ///
    /// Returns `true` when a new worker was started. It holds no model yet.
    pub fn ensure_running(&self) -> Result<bool> {
        let mut process = self.process.lock().unwrap_or_else(|e| e.into_inner());

        if self.is_responding() {
            return Ok(false);
        }

        if let Some(mut dead) = process.take() {
            warn!("Model worker stopped responding, restarting it");
            let _ = dead.kill();
            let _ = dead.wait();
        }

        if self.socket_path.exists() {
            debug!("Removing stale worker socket {:?}", self.socket_path);
            let _ = std::fs::remove_file(&self.socket_path);
        }

        info!("Starting model worker {:?}", self.script_path);
        let mut child = Command::new(&self.python_cmd)
            .arg(&self.script_path)
            .arg("--socket")
            .arg(&self.socket_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::WorkerError(format!("Failed to start model worker: {}", e)))?;

        let started = Instant::now();
        while started.elapsed() < self.startup_timeout {
            std::thread::sleep(Duration::from_millis(100));

            if let Some(status) = child.try_wait()? {
                return Err(Error::WorkerError(format!(
                    "Model worker exited during startup ({})",
                    status
                )));
            }

            if self.is_responding() {
                info!("Model worker ready after {:.1}s", started.elapsed().as_secs_f32());
                *process = Some(child);
                self.epoch.fetch_add(1, Ordering::SeqCst);
                return Ok(true);
            }
        }

        let _ = child.kill();
        let _ = child.wait();
        Err(Error::WorkerError(format!(
            "Model worker failed to start within {}s",
            self.startup_timeout.as_secs()
        )))
    }

    fn is_responding(&self) -> bool {
        self.socket_path.exists() && self.send(&WorkerRequest::command("status")).is_ok()
    }

    /// Ask the worker which accelerators the model runtime can see.
    pub fn probe(&self) -> Result<AcceleratorInfo> {
        let response = self.call(&WorkerRequest::command("probe"))?;
        response
            .accelerators
            .ok_or_else(|| Error::WorkerError("Probe response had no accelerators".to_string()))
    }

    /// Load the model from a local snapshot onto `device` in eval mode.
    ///
    /// Returns the epoch of the worker now holding the model.
    pub fn load_model(&self, model_path: &Path, device: Device) -> Result<u64> {
        let request = WorkerRequest {
            model_path: Some(model_path.to_string_lossy().to_string()),
            device: Some(device),
            ..WorkerRequest::command("load")
        };
        self.ensure_running()?;
        let epoch = self.epoch();
        let response = self.send(&request)?;
        debug!("Worker load response: {:?}", response.status);
        Ok(epoch)
    }

    pub fn generate(&self, inputs: &ModelInputs, options: &GenerationOptions) -> Result<Tensor> {
        let request = WorkerRequest {
            inputs: Some(inputs.to_wire()),
            do_sample: Some(options.do_sample),
            inference_mode: Some(options.inference_mode),
            ..WorkerRequest::command("generate")
        };
        let response = self.call(&request)?;
        let audio = response
            .audio
            .ok_or_else(|| Error::GenerationError("Worker returned no audio".to_string()))?;
        Tensor::from_wire(audio)
    }

    pub fn status(&self) -> Result<WorkerStatus> {
        let response = self.call(&WorkerRequest::command("status"))?;
        Ok(WorkerStatus {
            device: response.device,
            model_loaded: response.model_loaded,
        })
    }

    /// Ask the worker to exit, killing it if it does not.
    pub fn shutdown(&self) -> Result<()> {
        let mut process = self.process.lock().unwrap_or_else(|e| e.into_inner());

        if self.socket_path.exists() {
            info!("Stopping model worker");
            if let Err(e) = self.send(&WorkerRequest::command("shutdown")) {
                debug!("Shutdown request failed: {}", e);
            }
        }

        if let Some(mut child) = process.take() {
            for _ in 0..50 {
                if child.try_wait()?.is_some() {
                    return Ok(());
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            warn!("Model worker did not exit, killing it");
            let _ = child.kill();
            let _ = child.wait();
        }
        Ok(())
    }

    fn call(&self, request: &WorkerRequest) -> Result<WorkerResponse> {
        self.ensure_running()?;
        self.send(request)
    }

    fn send(&self, request: &WorkerRequest) -> Result<WorkerResponse> {
        let mut stream = UnixStream::connect(&self.socket_path).map_err(|e| {
            Error::WorkerError(format!("Failed to connect to model worker: {}", e))
        })?;
        stream.set_write_timeout(Some(Duration::from_secs(30))).ok();
        exchange(&mut stream, request)
    }
}

impl Drop for WorkerBridge {
    fn drop(&mut self) {
        let process = self.process.get_mut().unwrap_or_else(|e| e.into_inner());
        if let Some(mut child) = process.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Send one request frame and read one response frame.
pub(crate) fn exchange<S: Read + Write>(
    stream: &mut S,
    request: &WorkerRequest,
) -> Result<WorkerResponse> {
    let payload = serde_json::to_vec(request)?;
    write_frame(stream, &payload)
        .map_err(|e| Error::WorkerError(format!("Failed to write request: {}", e)))?;

    let response_buf = read_frame(stream)
        .map_err(|e| Error::WorkerError(format!("Failed to read response: {}", e)))?;
    let response: WorkerResponse = serde_json::from_slice(&response_buf)
        .map_err(|e| Error::WorkerError(format!("Failed to parse response: {}", e)))?;

    if let Some(message) = response.error {
        return Err(match response.kind.as_deref() {
            Some("load") => Error::ModelLoadError(message),
            Some("generate") => Error::GenerationError(message),
            Some("preset") => Error::UnknownVoicePreset(message),
            _ => Error::WorkerError(message),
        });
    }

    Ok(response)
}

pub(crate) fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> std::io::Result<()> {
    let length = u32::try_from(payload.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "frame too large"))?;
    writer.write_all(&length.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()
}

pub(crate) fn read_frame<R: Read>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut length_buf = [0u8; 4];
    reader.read_exact(&mut length_buf)?;
    let length = u32::from_be_bytes(length_buf) as usize;
    if length > MAX_FRAME_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {} bytes exceeds limit", length),
        ));
    }

    let mut buf = vec![0u8; length];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Stand-in worker speaking the frame protocol with the standard library only.
    /// `generate` answers with four fixed samples once a model is loaded. `crash`
    /// exits without replying or removing the socket.
    const FAKE_WORKER: &str = r#"
import base64, json, os, socket, struct, sys

def read_exact(conn, n):
    buf = b""
    while len(buf) < n:
        chunk = conn.recv(n - len(buf))
        if not chunk:
            raise ConnectionError("closed")
        buf += chunk
    return buf

def read_frame(conn):
    (length,) = struct.unpack(">I", read_exact(conn, 4))
    return json.loads(read_exact(conn, length))

def write_frame(conn, payload):
    data = json.dumps(payload).encode("utf-8")
    conn.sendall(struct.pack(">I", len(data)) + data)

AUDIO = base64.b64encode(struct.pack("<4f", 0.25, -0.25, 0.5, -0.5)).decode("ascii")
path = sys.argv[sys.argv.index("--socket") + 1]
device = None

server = socket.socket(socket.AF_UNIX, socket.SOCK_STREAM)
server.bind(path)
server.listen(4)
while True:
    conn, _ = server.accept()
    with conn:
        try:
            request = read_frame(conn)
        except ConnectionError:
            continue
        command = request.get("command")
        if command == "crash":
            os._exit(1)
        if command == "shutdown":
            write_frame(conn, {"status": "ok"})
            break
        if command == "load":
            device = request["device"]
            reply = {"status": "ok", "device": device, "model_loaded": True}
        elif command == "generate" and device is None:
            reply = {"error": "model is not loaded", "kind": "load"}
        elif command == "generate":
            audio = {"dtype": "float32", "shape": [1, 4], "device": "cpu", "data": AUDIO}
            reply = {"status": "ok", "audio": audio}
        elif command == "probe":
            reply = {"status": "ok", "accelerators": {"cuda_devices": 0, "mps": False}}
        else:
            reply = {"status": "ok", "device": device, "model_loaded": device is not None}
        write_frame(conn, reply)
server.close()
os.unlink(path)
"#;

    /// Samples every fake `generate` returns.
    pub const FAKE_AUDIO: [f32; 4] = [0.25, -0.25, 0.5, -0.5];

    /// Engine config running the fake worker out of `dir`.
    pub fn fake_worker_config(dir: &Path) -> EngineConfig {
        let script = dir.join("fake_worker.py");
        std::fs::write(&script, FAKE_WORKER).unwrap();
        EngineConfig {
            worker_script: script,
            socket_path: dir.join("worker.sock"),
            worker_startup_timeout_secs: 10,
            ..Default::default()
        }
    }

    /// Kill the worker on `socket_path` the way an OOM kill would.
    pub fn crash_worker(socket_path: &Path) {
        let mut stream = UnixStream::connect(socket_path).unwrap();
        assert!(exchange(&mut stream, &WorkerRequest::command("crash")).is_err());
    }
}
