use super::{RemoteStore, CONNECT_TIMEOUT_SECS};
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use std::time::Duration;
use tracing::debug;

/// 公开分享的 WebDAV 服务路径
const SERVICE_PATH: &str = "public.php/webdav";

/// PROPFIND 深度：一次请求覆盖整个目录树
const PROPFIND_DEPTH: &str = "infinity";

const PROPFIND_BODY: &str = r#"<?xml version="1.0"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:resourcetype />
    <d:getcontentlength />
  </d:prop>
</d:propfind>"#;

/// 公开分享目录的 WebDAV 客户端
///
/// 分享令牌作为 Basic 认证的用户名，密码为空。
pub struct WebDavClient {
    http: Client,
    endpoint: String,
    share: String,
    prefix: String,
    name: String,
}

impl WebDavClient {
    /// 创建客户端
    ///
    /// `tls_root` 为额外信任的 PEM 证书（自签名服务器），`timeout` 限制单次请求总耗时。
    pub fn new(
        server: &str,
        share: &str,
        tls_root: Option<&[u8]>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let server = server.trim_end_matches('/');
        let url = Url::parse(server)
            .map_err(|e| TransportError::Setup(format!("invalid server url {server:?}: {e}")))?;

        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(timeout);

        if let Some(pem) = tls_root {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| TransportError::Setup(format!("unable to load CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        // 服务器可能部署在子路径下，href 会带上这段路径
        let prefix = format!("{}/{}/", url.path().trim_end_matches('/'), SERVICE_PATH);

        Ok(Self {
            http,
            endpoint: format!("{}/{}", server, SERVICE_PATH),
            share: share.to_string(),
            prefix,
            name: format!("webdav://{}", url.host_str().unwrap_or(server)),
        })
    }

    /// 相对路径逐段编码后拼接到服务地址
    fn file_url(&self, path: &str) -> String {
        let encoded: Vec<_> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.endpoint, encoded.join("/"))
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&'static str>,
    ) -> Result<reqwest::Response, TransportError> {
        let mut request = self
            .http
            .request(method, url)
            .basic_auth(&self.share, Some(""));

        if let Some(body) = body {
            request = request
                .header("Depth", PROPFIND_DEPTH)
                .header(reqwest::header::CONTENT_TYPE, "application/xml; charset=utf-8")
                .body(body);
        }

        let response = request.send().await.map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl RemoteStore for WebDavClient {
    async fn list_remote_tree(&self) -> Result<String, TransportError> {
        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|e| TransportError::Setup(e.to_string()))?;

        debug!("PROPFIND {}", self.endpoint);
        let response = self.send(method, &self.endpoint, Some(PROPFIND_BODY)).await?;

        response.text().await.map_err(|source| TransportError::Request {
            url: self.endpoint.clone(),
            source,
        })
    }

    async fn fetch_file(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        let url = self.file_url(path);
        debug!("GET {}", url);
        let response = self.send(Method::GET, &url, None).await?;

        let data = response
            .bytes()
            .await
            .map_err(|source| TransportError::Request { url, source })?;
        Ok(data.to_vec())
    }

    fn service_prefix(&self) -> &str {
        &self.prefix
    }

    fn name(&self) -> &str {
        &self.name
    }
}
