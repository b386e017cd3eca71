// LibAV adapter - Demuxer, Muxer and PCM decoder over ffmpeg-next
//
// Timestamps cross the port boundary in microseconds; each handle rescales
// to and from its streams' own time bases. Codec parameters go through
// ffmpeg-next's safe API; only extradata needs raw codecpar access.

pub mod decoder;
pub mod demuxer;
pub mod muxer;

pub use decoder::{LibavPcmDecoder, LibavPcmSource};
pub use demuxer::{LibavDemuxer, LibavSource};
pub use muxer::{LibavMuxer, LibavSink};

use ffmpeg_next::codec::{self, Id};
use ffmpeg_next::{ffi, format, media};

use crate::domain::errors::PortError;

/// Codec ids with a well-known MIME type
const MIME_TABLE: &[(Id, &str)] = &[
    (Id::H264, "video/avc"),
    (Id::HEVC, "video/hevc"),
    (Id::AV1, "video/av01"),
    (Id::VP8, "video/x-vnd.on2.vp8"),
    (Id::VP9, "video/x-vnd.on2.vp9"),
    (Id::MPEG4, "video/mp4v-es"),
    (Id::H263, "video/3gpp"),
    (Id::MPEG2VIDEO, "video/mpeg2"),
    (Id::AAC, "audio/mp4a-latm"),
    (Id::MP3, "audio/mpeg"),
    (Id::OPUS, "audio/opus"),
    (Id::VORBIS, "audio/vorbis"),
    (Id::FLAC, "audio/flac"),
    (Id::AC3, "audio/ac3"),
    (Id::EAC3, "audio/eac3"),
    (Id::AMR_NB, "audio/3gpp"),
    (Id::AMR_WB, "audio/amr-wb"),
    (Id::PCM_S16LE, "audio/raw"),
    (Id::MOV_TEXT, "text/3gpp-tt"),
    (Id::SUBRIP, "application/x-subrip"),
];

/// MIME type for a codec, falling back to `<medium>/<codec name>`
pub fn mime_for_codec(id: Id, medium: media::Type) -> String {
    if let Some((_, mime)) = MIME_TABLE.iter().find(|(known, _)| *known == id) {
        return (*mime).to_string();
    }
    let prefix = match medium {
        media::Type::Video => "video",
        media::Type::Audio => "audio",
        media::Type::Subtitle => "text",
        _ => "application",
    };
    format!("{}/{}", prefix, id.name())
}

/// Codec id for a MIME type produced by [`mime_for_codec`]
pub fn codec_for_mime(mime_type: &str) -> Option<Id> {
    let mime = mime_type.to_ascii_lowercase();
    if let Some((id, _)) = MIME_TABLE.iter().find(|(_, known)| *known == mime) {
        return Some(*id);
    }
    let name = mime.split_once('/').map(|(_, name)| name)?;
    codec_by_name(name)
}

/// Codec id registered under `name` (e.g. `h264`)
pub fn codec_by_name(name: &str) -> Option<Id> {
    ffmpeg_next::decoder::find_by_name(name)
        .or_else(|| ffmpeg_next::encoder::find_by_name(name))
        .map(|codec| codec.id())
        .filter(|id| *id != Id::None)
}

/// Codec-specific setup data of a stream (SPS/PPS, AudioSpecificConfig, ...)
pub(crate) fn read_extradata(params: &codec::Parameters) -> Vec<u8> {
    // SAFETY: ffmpeg-next exposes no accessor for extradata. codecpar is
    // owned by the stream behind `params` and is only read here.
    unsafe {
        let par = params.as_ptr();
        if (*par).extradata.is_null() || (*par).extradata_size <= 0 {
            Vec::new()
        } else {
            std::slice::from_raw_parts((*par).extradata, (*par).extradata_size as usize).to_vec()
        }
    }
}

/// Attach `data` as the extradata of stream `index` of an output not yet started
pub(crate) fn write_extradata(
    output: &mut format::context::Output,
    index: usize,
    data: &[u8],
) -> Result<(), PortError> {
    if data.is_empty() {
        return Ok(());
    }
    // SAFETY: ffmpeg-next exposes no setter for extradata. The stream exists,
    // the header is not written yet, and the buffer is allocated with libav's
    // allocator and padding so codecpar can take ownership of it.
    unsafe {
        let nb_streams = (*output.as_ptr()).nb_streams as usize;
        if index >= nb_streams {
            return Err(PortError::State(format!("no output stream {index}")));
        }
        let par = (**(*output.as_mut_ptr()).streams.add(index)).codecpar;
        let padded = data.len() + ffi::AV_INPUT_BUFFER_PADDING_SIZE as usize;
        let buffer = ffi::av_mallocz(padded) as *mut u8;
        if buffer.is_null() {
            return Err(PortError::Io("extradata: out of memory".to_string()));
        }
        std::ptr::copy_nonoverlapping(data.as_ptr(), buffer, data.len());
        ffi::av_freep(&mut (*par).extradata as *mut *mut u8 as *mut std::ffi::c_void);
        (*par).extradata = buffer;
        (*par).extradata_size = data.len() as i32;
    }
    Ok(())
}

pub(crate) fn io_error(reference: &str, err: ffmpeg_next::Error) -> PortError {
    PortError::Io(format!("{reference}: {err}"))
}

pub(crate) fn open_error(reference: &str, err: ffmpeg_next::Error) -> PortError {
    PortError::Open {
        reference: reference.to_string(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codecs_map_both_ways() {
        assert_eq!(mime_for_codec(Id::H264, media::Type::Video), "video/avc");
        assert_eq!(mime_for_codec(Id::AAC, media::Type::Audio), "audio/mp4a-latm");
        assert_eq!(codec_for_mime("video/avc"), Some(Id::H264));
        assert_eq!(codec_for_mime("AUDIO/MP4A-LATM"), Some(Id::AAC));
    }

    #[test]
    fn test_codec_name_fallback() {
        assert_eq!(codec_by_name("h264"), Some(Id::H264));
        assert_eq!(codec_for_mime("video/h264"), Some(Id::H264));
        assert_eq!(codec_for_mime("audio/pcm_s16be"), Some(Id::PCM_S16BE));
        assert_eq!(codec_by_name("definitely-not-a-codec"), None);
    }

    #[test]
    fn test_unknown_mime_has_no_codec() {
        assert_eq!(codec_for_mime("video/definitely-not-a-codec"), None);
        assert_eq!(codec_for_mime("garbage"), None);
    }
}
