use crate::RowError;

const WKB_POINT: u32 = 1;

// EWKB type flags as emitted by PostGIS.
const EWKB_Z_FLAG: u32 = 0x8000_0000;
const EWKB_M_FLAG: u32 = 0x4000_0000;
const EWKB_SRID_FLAG: u32 = 0x2000_0000;

/// Decode a hex-encoded WKB point payload into (latitude, longitude).
///
/// Accepts both byte orders and the PostGIS EWKB SRID variant. Axis order in
/// the payload is x = longitude, y = latitude.
pub fn decode_point_hex(payload: &str) -> Result<(f64, f64), RowError> {
    let bytes = hex::decode(payload.trim())
        .map_err(|e| RowError::Decode(format!("invalid hex: {}", e)))?;
    decode_point(&bytes)
}

fn decode_point(bytes: &[u8]) -> Result<(f64, f64), RowError> {
    if bytes.len() < 5 {
        return Err(RowError::Decode("payload too short".to_string()));
    }

    let little_endian = match bytes[0] {
        0 => false,
        1 => true,
        other => {
            return Err(RowError::Decode(format!(
                "unknown byte order marker {:#04x}",
                other
            )))
        }
    };

    let raw_type = read_u32(&bytes[1..5], little_endian);
    let mut offset = 5;

    // The SRID itself carries no information we need; lon/lat axis order is
    // the same for every SRID the producers emit.
    if raw_type & EWKB_SRID_FLAG != 0 {
        if bytes.len() < offset + 4 {
            return Err(RowError::Decode("truncated SRID".to_string()));
        }
        offset += 4;
    }

    let geom_type = raw_type & !(EWKB_Z_FLAG | EWKB_M_FLAG | EWKB_SRID_FLAG);
    // ISO WKB encodes higher-dimension points as 1001/2001/3001.
    if geom_type % 1000 != WKB_POINT {
        return Err(RowError::Decode(format!(
            "geometry type {} is not a point",
            geom_type
        )));
    }

    if bytes.len() < offset + 16 {
        return Err(RowError::Decode("truncated coordinates".to_string()));
    }
    let longitude = read_f64(&bytes[offset..offset + 8], little_endian);
    let latitude = read_f64(&bytes[offset + 8..offset + 16], little_endian);

    if !longitude.is_finite() || !latitude.is_finite() {
        return Err(RowError::Decode("non-finite coordinate".to_string()));
    }

    Ok((latitude, longitude))
}

fn read_u32(bytes: &[u8], little_endian: bool) -> u32 {
    let chunk = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if little_endian {
        u32::from_le_bytes(chunk)
    } else {
        u32::from_be_bytes(chunk)
    }
}

fn read_f64(bytes: &[u8], little_endian: bool) -> f64 {
    let chunk = [
        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
    ];
    if little_endian {
        f64::from_le_bytes(chunk)
    } else {
        f64::from_be_bytes(chunk)
    }
}
