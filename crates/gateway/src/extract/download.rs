use futures_util::StreamExt;
use pp_domain::error::{Error, Result};

/// GET `url`, streaming the body and aborting once it exceeds `max_bytes`.
pub async fn fetch_capped(client: &reqwest::Client, url: &str, max_bytes: usize) -> Result<Vec<u8>> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Extraction(format!("could not download the attachment: {e}")))?;
    if !resp.status().is_success() {
        return Err(Error::Extraction(format!(
            "could not download the attachment (HTTP {})",
            resp.status().as_u16()
        )));
    }
    if let Some(len) = resp.content_length() {
        if len as usize > max_bytes {
            return Err(too_large(max_bytes));
        }
    }

    let mut stream = resp.bytes_stream();
    let mut buf: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk
            .map_err(|e| Error::Extraction(format!("attachment download interrupted: {e}")))?;
        if buf.len() + chunk.len() > max_bytes {
            return Err(too_large(max_bytes));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

fn too_large(max_bytes: usize) -> Error {
    Error::Extraction(format!(
        "the attachment is larger than the {} MB limit",
        max_bytes / (1024 * 1024)
    ))
}
