//! Request/reply framing built on top of the token codec: the ordered
//! sequences of tokens that make up one compile job, as described in
//! spec.md §4.1/§4.6/§4.8.

use std::io::{Read, Write};

use distcc_compress::lzo::Lzo1x;
use distcc_compress::Compressor;

use crate::error::WireError;
use crate::token::{self, tag};

/// The request a client sends after opening a connection (spec.md §4.6
/// "Send"). `files` is only populated for server-cpp (pump) jobs.
#[derive(Debug, Clone)]
pub struct Request {
    pub protover: u32,
    /// Present only for server-cpp requests.
    pub cdir: Option<String>,
    pub argv: Vec<String>,
    /// `(name, is_symlink_target, body)` triples, server-cpp only.
    pub files: Vec<IncludeFile>,
    /// Preprocessed source body, client-cpp only, as plaintext — the
    /// LZO1X compression implied by `protover` 2/3 is applied by
    /// [`write_request`]/[`read_request`], not by the caller.
    pub doti: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub struct IncludeFile {
    pub name: String,
    pub body: IncludeFileBody,
}

#[derive(Debug, Clone)]
pub enum IncludeFileBody {
    Link(String),
    File(Vec<u8>),
}

/// The reply a server sends back (spec.md §4.8 step 9, §4.6 "Receive").
#[derive(Debug, Clone)]
pub struct Reply {
    pub protover: u32,
    pub status: i32,
    pub stderr: Vec<u8>,
    pub stdout: Vec<u8>,
    /// `None` means a zero-length DOTO: "no object", do not create the file.
    pub object: Option<Vec<u8>>,
    /// Present only when the request was server-cpp and a dotd was produced.
    pub dotd: Option<Vec<u8>>,
}

/// Writes a full request, already cork/uncork-agnostic: callers are
/// responsible for any socket-level corking around this call.
///
/// `req.doti` is the plaintext preprocessed source; for protovers 2 and
/// 3 it is LZO1X-compressed before being framed (spec.md §4.1). `NFIL`
/// file bodies are never touched here — per spec.md §4.12 they are
/// already LZO-compressed by the include scanner when their extension
/// says so, and travel with no further compression regardless of the
/// negotiated protover.
pub fn write_request(w: &mut impl Write, req: &Request) -> Result<(), WireError> {
    token::write_token(w, tag::DIST, req.protover)?;

    if let Some(cdir) = &req.cdir {
        token::write_token_with_payload(w, tag::CDIR, cdir.as_bytes())?;
    }

    token::write_token(w, tag::ARGC, req.argv.len() as u32)?;
    for arg in &req.argv {
        token::write_token_with_payload(w, tag::ARGV, arg.as_bytes())?;
    }

    if !req.files.is_empty() {
        token::write_token(w, tag::NFIL, req.files.len() as u32)?;
        for file in &req.files {
            token::write_token_with_payload(w, tag::NAME, file.name.as_bytes())?;
            match &file.body {
                IncludeFileBody::Link(target) => {
                    token::write_token_with_payload(w, tag::LINK, target.as_bytes())?;
                }
                IncludeFileBody::File(bytes) => {
                    token::write_token_with_payload(w, tag::FILE, bytes)?;
                }
            }
        }
    }

    if let Some(doti) = &req.doti {
        let body = if protover_implies_compression(req.protover) {
            Lzo1x.compress(doti)?
        } else {
            doti.clone()
        };
        token::write_token_with_payload(w, tag::DOTI, &body)?;
    }

    Ok(())
}

/// Reads a request as the server sees it. Whether CDIR/NFIL framing
/// follows is derived from the DIST protover just read
/// ([`protover_implies_server_cpp`]), matching the wire rule that
/// protocol version is declared once and fixes the rest of the frame.
pub fn read_request(r: &mut impl Read) -> Result<Request, WireError> {
    let protover = token::read_expected_token(r, tag::DIST)?;
    let expect_cdir = protover_implies_server_cpp(protover);

    let cdir = if expect_cdir {
        let (tag, bytes) = token::read_token_with_payload(r)?;
        if tag != tag::CDIR {
            return Err(WireError::UnexpectedTag {
                expected: tag::CDIR,
                got: tag,
            });
        }
        Some(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        None
    };

    let argc = token::read_expected_token(r, tag::ARGC)?;
    let mut argv = Vec::with_capacity(argc as usize);
    for _ in 0..argc {
        let (tag, bytes) = token::read_token_with_payload(r)?;
        if tag != tag::ARGV {
            return Err(WireError::UnexpectedTag {
                expected: tag::ARGV,
                got: tag,
            });
        }
        argv.push(String::from_utf8_lossy(&bytes).into_owned());
    }

    let mut files = Vec::new();
    let mut doti = None;

    if expect_cdir {
        let nfil = token::read_expected_token(r, tag::NFIL)?;
        for _ in 0..nfil {
            let (name_tag, name_bytes) = token::read_token_with_payload(r)?;
            if name_tag != tag::NAME {
                return Err(WireError::UnexpectedTag {
                    expected: tag::NAME,
                    got: name_tag,
                });
            }
            let name = String::from_utf8_lossy(&name_bytes).into_owned();
            let (body_tag, body_bytes) = token::read_token_with_payload(r)?;
            let body = match body_tag.as_str() {
                t if t == tag::LINK => {
                    IncludeFileBody::Link(String::from_utf8_lossy(&body_bytes).into_owned())
                }
                t if t == tag::FILE => IncludeFileBody::File(body_bytes),
                other => {
                    return Err(WireError::UnexpectedTag {
                        expected: tag::FILE,
                        got: other.to_string(),
                    })
                }
            };
            files.push(IncludeFile { name, body });
        }
    } else {
        let (tag, bytes) = token::read_token_with_payload(r)?;
        if tag != tag::DOTI {
            return Err(WireError::UnexpectedTag {
                expected: tag::DOTI,
                got: tag,
            });
        }
        doti = Some(if protover_implies_compression(protover) {
            Lzo1x.decompress(&bytes, 0)?
        } else {
            bytes
        });
    }

    Ok(Request {
        protover,
        cdir,
        argv,
        files,
        doti,
    })
}

/// Writes a full reply (server side). `reply.object`/`reply.dotd` are
/// plaintext; both are LZO1X-compressed here when `protover` implies
/// it, matching [`write_request`]'s treatment of `DOTI`. `SERR`/`SOUT`
/// are never compressed — only the bulk object/dependency bodies are.
pub fn write_reply(w: &mut impl Write, reply: &Reply) -> Result<(), WireError> {
    token::write_token(w, tag::DONE, reply.protover)?;
    token::write_token(w, tag::STAT, reply.status as u32)?;
    token::write_token_with_payload(w, tag::SERR, &reply.stderr)?;
    token::write_token_with_payload(w, tag::SOUT, &reply.stdout)?;
    let compress = protover_implies_compression(reply.protover);
    match &reply.object {
        Some(bytes) => {
            let body = if compress { Lzo1x.compress(bytes)? } else { bytes.clone() };
            token::write_token_with_payload(w, tag::DOTO, &body)?;
        }
        None => token::write_token(w, tag::DOTO, 0)?,
    }
    if let Some(dotd) = &reply.dotd {
        let body = if compress { Lzo1x.compress(dotd)? } else { dotd.clone() };
        token::write_token_with_payload(w, tag::DOTD, &body)?;
    }
    Ok(())
}

/// Reads a full reply (client side). `expect_dotd` comes from whether
/// the client's own request was server-cpp; the reply's own DONE token
/// only echoes the protover and carries no framing information of its
/// own, so this cannot be derived from the reply alone.
pub fn read_reply(r: &mut impl Read, expect_dotd: bool) -> Result<Reply, WireError> {
    let protover = token::read_expected_token(r, tag::DONE)?;
    let status = token::read_expected_token(r, tag::STAT)? as i32;

    let (tag, stderr) = token::read_token_with_payload(r)?;
    if tag != tag::SERR {
        return Err(WireError::UnexpectedTag {
            expected: tag::SERR,
            got: tag,
        });
    }
    let (tag, stdout) = token::read_token_with_payload(r)?;
    if tag != tag::SOUT {
        return Err(WireError::UnexpectedTag {
            expected: tag::SOUT,
            got: tag,
        });
    }
    let (tag, object_bytes) = token::read_token_with_payload(r)?;
    if tag != tag::DOTO {
        return Err(WireError::UnexpectedTag {
            expected: tag::DOTO,
            got: tag,
        });
    }
    let compress = protover_implies_compression(protover);
    let object = if object_bytes.is_empty() {
        None
    } else if compress {
        Some(Lzo1x.decompress(&object_bytes, 0)?)
    } else {
        Some(object_bytes)
    };

    let dotd = if expect_dotd {
        let (tag, bytes) = token::read_token_with_payload(r)?;
        if tag != tag::DOTD {
            return Err(WireError::UnexpectedTag {
                expected: tag::DOTD,
                got: tag,
            });
        }
        Some(if compress { Lzo1x.decompress(&bytes, 0)? } else { bytes })
    } else {
        None
    };

    Ok(Reply {
        protover,
        status,
        stderr,
        stdout,
        object,
        dotd,
    })
}

/// Whether this protocol version places preprocessing (and therefore
/// CDIR/NFIL framing) on the server.
#[must_use]
pub const fn protover_implies_server_cpp(protover: u32) -> bool {
    protover == 3
}

/// Whether `DOTI`/`DOTO`/`DOTD` bodies are LZO1X-compressed under this
/// protocol version. Per spec.md §3's protover invariant, protover 1 is
/// always uncompressed and protovers 2/3 always are; `NFIL` file bodies
/// are excluded from this (see `write_request`).
#[must_use]
pub const fn protover_implies_compression(protover: u32) -> bool {
    protover != 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn round_trips_client_cpp_request() {
        let req = Request {
            protover: 2,
            cdir: None,
            argv: vec!["cc1".into(), "-o".into(), "hello.o".into()],
            files: Vec::new(),
            doti: Some(b"int main(){}".to_vec()),
        };
        let mut buf = Vec::new();
        write_request(&mut buf, &req).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded = read_request(&mut cursor).unwrap();
        assert_eq!(decoded.protover, 2);
        assert_eq!(decoded.argv, req.argv);
        assert_eq!(decoded.doti, req.doti);
    }

    #[test]
    fn round_trips_server_cpp_request_with_files() {
        let req = Request {
            protover: 3,
            cdir: Some("/home/user/project".into()),
            argv: vec!["cc1".into()],
            files: vec![
                IncludeFile {
                    name: "/abs/path/hello.c".into(),
                    body: IncludeFileBody::File(b"source".to_vec()),
                },
                IncludeFile {
                    name: "/abs/path/link.h".into(),
                    body: IncludeFileBody::Link("/abs/real.h".into()),
                },
            ],
            doti: None,
        };
        let mut buf = Vec::new();
        write_request(&mut buf, &req).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded = read_request(&mut cursor).unwrap();
        assert_eq!(decoded.cdir.as_deref(), Some("/home/user/project"));
        assert_eq!(decoded.files.len(), 2);
    }

    #[test]
    fn round_trips_reply_with_zero_length_object() {
        let reply = Reply {
            protover: 1,
            status: 1,
            stderr: b"error: x".to_vec(),
            stdout: Vec::new(),
            object: None,
            dotd: None,
        };
        let mut buf = Vec::new();
        write_reply(&mut buf, &reply).unwrap();
        let mut cursor = Cursor::new(buf);
        let decoded = read_reply(&mut cursor, false).unwrap();
        assert_eq!(decoded.status, 1);
        assert!(decoded.object.is_none());
    }

    #[test]
    fn round_trips_reply_with_dotd() {
        let reply = Reply {
            protover: 3,
            status: 0,
            stderr: Vec::new(),
            stdout: Vec::new(),
            object: Some(b"ELF...".to_vec()),
            dotd: Some(b"hello.o: hello.c\n".to_vec()),
        };
        let mut buf = Vec::new();
        write_reply(&mut buf, &reply).unwrap();
        let mut cursor = Cursor::new(buf);
        let decoded = read_reply(&mut cursor, true).unwrap();
        assert_eq!(decoded.object.unwrap(), b"ELF...");
        assert_eq!(decoded.dotd.unwrap(), b"hello.o: hello.c\n");
    }

    #[test]
    fn protover_one_sends_doti_uncompressed_on_the_wire() {
        let plaintext = b"int main(){return 0;}".repeat(4);
        let req = Request {
            protover: 1,
            cdir: None,
            argv: vec!["cc1".into()],
            files: Vec::new(),
            doti: Some(plaintext.clone()),
        };
        let mut buf = Vec::new();
        write_request(&mut buf, &req).unwrap();
        assert!(
            buf.windows(plaintext.len()).any(|w| w == plaintext.as_slice()),
            "protover 1 must not compress DOTI"
        );
    }

    #[test]
    fn protover_two_sends_doti_compressed_on_the_wire() {
        let plaintext = b"int main(){return 0;}".repeat(4);
        let req = Request {
            protover: 2,
            cdir: None,
            argv: vec!["cc1".into()],
            files: Vec::new(),
            doti: Some(plaintext.clone()),
        };
        let mut buf = Vec::new();
        write_request(&mut buf, &req).unwrap();
        assert!(
            !buf.windows(plaintext.len()).any(|w| w == plaintext.as_slice()),
            "protover 2 must compress DOTI before sending"
        );

        let mut cursor = Cursor::new(buf);
        let decoded = read_request(&mut cursor).unwrap();
        assert_eq!(decoded.doti.unwrap(), plaintext);
    }

    #[test]
    fn nfil_file_bodies_are_never_recompressed() {
        let precompressed = b"already-lzo-bytes-from-the-scanner".to_vec();
        let req = Request {
            protover: 3,
            cdir: Some("/proj".into()),
            argv: vec!["cc1".into()],
            files: vec![IncludeFile {
                name: "/proj/a.c".into(),
                body: IncludeFileBody::File(precompressed.clone()),
            }],
            doti: None,
        };
        let mut buf = Vec::new();
        write_request(&mut buf, &req).unwrap();
        let mut cursor = Cursor::new(buf);
        let decoded = read_request(&mut cursor).unwrap();
        match &decoded.files[0].body {
            IncludeFileBody::File(bytes) => assert_eq!(bytes, &precompressed),
            IncludeFileBody::Link(_) => panic!("expected a file body"),
        }
    }
}
