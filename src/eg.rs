use crate::bitreader::BitReader;
use crate::{Error, Result};

pub fn read_ue(reader: &mut BitReader) -> Result<u32> {
    let mut leading_zeros = 0;
    
    while !reader.read_bit()? {
        leading_zeros += 1;
        if leading_zeros > 31 {
            return Err(Error::BitstreamError("Invalid exp-golomb code".into()));
        }
    }

    if leading_zeros == 0 {
        return Ok(0);
    }

    let code_value = reader.read_bits(leading_zeros)?;
    Ok((1 << leading_zeros) - 1 + code_value)
}

pub fn read_se(reader: &mut BitReader) -> Result<i32> {
    let code_num = read_ue(reader)?;
    
    // H.264 spec mapping:
    // code_num = 0 => 0
    // code_num = 1 => 1
    // code_num = 2 => -1
    // code_num = 3 => 2
    // code_num = 4 => -2
    // Pattern: odd values are positive, even values (except 0) are negative
    
    if code_num == 0 {
        Ok(0)
    } else if code_num & 1 == 1 {
        // Odd: positive value
        Ok(((code_num + 1) >> 1) as i32)
    } else {
        // Even: negative value
        Ok(-((code_num >> 1) as i32))
    }
}
