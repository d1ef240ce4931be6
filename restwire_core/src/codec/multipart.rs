use crate::transport::BodyStream;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;

pub(crate) enum PartBody {
    Bytes(Bytes),
    Stream(BodyStream),
}

pub(crate) struct Part {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub body: PartBody,
}

pub(crate) fn content_type(boundary: &str) -> String {
    format!("multipart/form-data; boundary={boundary}")
}

pub(crate) fn single_chunk(b: Bytes) -> BodyStream {
    Box::pin(stream::once(futures::future::ready(Ok(b))))
}

fn quoted(s: &str) -> String {
    s.replace('"', "%22").replace(['\r', '\n'], "")
}

fn part_head(boundary: &str, part: &Part) -> Bytes {
    let mut head = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"",
        quoted(&part.name)
    );
    if let Some(f) = &part.file_name {
        head.push_str(&format!("; filename=\"{}\"", quoted(f)));
    }
    head.push_str("\r\n");
    if let Some(ct) = &part.content_type {
        head.push_str(&format!("Content-Type: {ct}\r\n"));
    }
    head.push_str("\r\n");
    Bytes::from(head)
}

/// Encode parts lazily: stream parts are forwarded chunk by chunk.
pub(crate) fn encode(boundary: &str, parts: Vec<Part>) -> BodyStream {
    let mut pieces: Vec<BodyStream> = Vec::with_capacity(parts.len() * 3 + 1);
    for part in parts {
        pieces.push(single_chunk(part_head(boundary, &part)));
        pieces.push(match part.body {
            PartBody::Bytes(b) => single_chunk(b),
            PartBody::Stream(s) => s,
        });
        pieces.push(single_chunk(Bytes::from_static(b"\r\n")));
    }
    pieces.push(single_chunk(Bytes::from(format!("--{boundary}--\r\n"))));
    Box::pin(stream::iter(pieces).flatten())
}

#[cfg(test)]
mod test {
    use super::*;
    use futures::TryStreamExt;

    #[tokio::test]
    async fn encodes_parts_in_order() {
        let parts = vec![
            Part {
                name: "title".into(),
                file_name: None,
                content_type: Some("text/plain; charset=utf-8".into()),
                body: PartBody::Bytes(Bytes::from_static(b"hello")),
            },
            Part {
                name: "file".into(),
                file_name: Some("file".into()),
                content_type: Some("application/octet-stream".into()),
                body: PartBody::Stream(Box::pin(stream::iter(vec![
                    Ok::<_, crate::error::FxError>(Bytes::from_static(b"ab")),
                    Ok(Bytes::from_static(b"cd")),
                ]))),
            },
        ];
        let chunks: Vec<Bytes> = encode("B", parts).try_collect().await.unwrap();
        let body: Vec<u8> = chunks.concat();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "--B\r\nContent-Disposition: form-data; name=\"title\"\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nhello\r\n\
             --B\r\nContent-Disposition: form-data; name=\"file\"; filename=\"file\"\r\nContent-Type: application/octet-stream\r\n\r\nabcd\r\n\
             --B--\r\n"
        );
    }
}
