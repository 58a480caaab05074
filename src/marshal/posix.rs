//! `termios` and `winsize` marshalling.

use crate::error::Result;
use crate::managed::Object;
use crate::native::posix::{self, Termios, WinSize};

use super::cache::{AccessorSet, StructKind};
use super::NativeStruct;

impl NativeStruct for Termios {
    const KIND: StructKind = StructKind::Termios;

    fn zeroed() -> Self {
        // SAFETY: termios is plain integers and a byte array; all-zero is valid.
        unsafe { std::mem::zeroed() }
    }

    fn load(fields: &AccessorSet, obj: &Object, out: &mut Self) -> Result<()> {
        let [iflag, oflag, cflag, lflag, cc, ispeed, ospeed] = fields.fields()?;
        out.c_iflag = obj.get_long(iflag)? as libc::tcflag_t;
        out.c_oflag = obj.get_long(oflag)? as libc::tcflag_t;
        out.c_cflag = obj.get_long(cflag)? as libc::tcflag_t;
        out.c_lflag = obj.get_long(lflag)? as libc::tcflag_t;
        // Exactly NCCS bytes: a shorter array is an error, extra bytes are ignored
        if let Some(array) = obj.get_array(cc)? {
            array.get_region(0, &mut out.c_cc[..])?;
        }
        posix::set_speeds(
            out,
            obj.get_long(ispeed)? as libc::speed_t,
            obj.get_long(ospeed)? as libc::speed_t,
        );
        Ok(())
    }

    fn store(fields: &AccessorSet, src: &Self, obj: &Object) -> Result<()> {
        let [iflag, oflag, cflag, lflag, cc, ispeed, ospeed] = fields.fields()?;
        obj.set_long(iflag, src.c_iflag as i64)?;
        obj.set_long(oflag, src.c_oflag as i64)?;
        obj.set_long(cflag, src.c_cflag as i64)?;
        obj.set_long(lflag, src.c_lflag as i64)?;
        if let Some(array) = obj.get_array(cc)? {
            array.set_region(0, &src.c_cc[..])?;
        }
        let (i, o) = posix::speeds(src);
        obj.set_long(ispeed, i as i64)?;
        obj.set_long(ospeed, o as i64)?;
        Ok(())
    }
}

impl NativeStruct for WinSize {
    const KIND: StructKind = StructKind::WinSize;

    fn zeroed() -> Self {
        WinSize {
            ws_row: 0,
            ws_col: 0,
            ws_xpixel: 0,
            ws_ypixel: 0,
        }
    }

    fn load(fields: &AccessorSet, obj: &Object, out: &mut Self) -> Result<()> {
        let [row, col, xpixel, ypixel] = fields.fields()?;
        out.ws_row = obj.get_short(row)? as u16;
        out.ws_col = obj.get_short(col)? as u16;
        out.ws_xpixel = obj.get_short(xpixel)? as u16;
        out.ws_ypixel = obj.get_short(ypixel)? as u16;
        Ok(())
    }

    fn store(fields: &AccessorSet, src: &Self, obj: &Object) -> Result<()> {
        let [row, col, xpixel, ypixel] = fields.fields()?;
        obj.set_short(row, src.ws_row as i16)?;
        obj.set_short(col, src.ws_col as i16)?;
        obj.set_short(xpixel, src.ws_xpixel as i16)?;
        obj.set_short(ypixel, src.ws_ypixel as i16)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::error::BridgeError;
    use crate::managed::{types, Array, Runtime, Value};
    use crate::marshal::{read_into_native, write_from_native};
    use crate::native::posix::NCCS;

    fn termios_object(runtime: &Runtime) -> crate::managed::ObjectRef {
        runtime.new_object(types::TERMIOS).unwrap()
    }

    #[test]
    fn test_win_size_round_trip() {
        let runtime = Runtime::with_standard_classes();
        let obj = runtime.new_object(types::WIN_SIZE).unwrap();
        let native = WinSize {
            ws_row: 50,
            ws_col: 132,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        write_from_native(&native, &obj).unwrap();
        assert_eq!(obj.field("ws_row"), Some(Value::Short(50)));
        assert_eq!(obj.field("ws_col"), Some(Value::Short(132)));

        let back: WinSize = read_into_native(&obj).unwrap();
        assert_eq!((back.ws_row, back.ws_col), (50, 132));
    }

    #[test]
    fn test_win_size_wraps_wide_values() {
        let runtime = Runtime::with_standard_classes();
        let obj = runtime.new_object(types::WIN_SIZE).unwrap();
        obj.set_field("ws_col", Value::Short(-1)).unwrap();
        let native: WinSize = read_into_native(&obj).unwrap();
        assert_eq!(native.ws_col, u16::MAX);
    }

    #[test]
    fn test_termios_short_cc_is_out_of_range() {
        let runtime = Runtime::with_standard_classes();
        let obj = termios_object(&runtime);
        obj.set_field(types::TERMIOS_CC_FIELD, Value::Array(Some(Array::zeroed::<u8>(NCCS - 1))))
            .unwrap();

        match read_into_native::<Termios>(&obj) {
            Err(BridgeError::OutOfRange { required, len }) => {
                assert_eq!(required, NCCS);
                assert_eq!(len, NCCS - 1);
            }
            other => panic!("expected OutOfRange, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_termios_long_cc_is_truncated() {
        let runtime = Runtime::with_standard_classes();
        let obj = termios_object(&runtime);
        let bytes: Vec<u8> = (0..NCCS as u8 + 8).collect();
        obj.set_field(types::TERMIOS_CC_FIELD, Value::Array(Some(Array::new(bytes.clone()))))
            .unwrap();

        let native: Termios = read_into_native(&obj).unwrap();
        assert_eq!(&native.c_cc[..], &bytes[..NCCS]);

        // Writing back only touches the first NCCS bytes
        let mut changed = native;
        changed.c_cc[0] = 0xAA;
        write_from_native(&changed, &obj).unwrap();
        let Some(Value::Array(Some(array))) = obj.field(types::TERMIOS_CC_FIELD) else {
            panic!("c_cc vanished");
        };
        let after = array.to_vec::<u8>().unwrap();
        assert_eq!(after[0], 0xAA);
        assert_eq!(&after[NCCS..], &bytes[NCCS..]);
    }

    #[test]
    fn test_termios_null_cc_is_skipped() {
        let runtime = Runtime::with_standard_classes();
        let obj = termios_object(&runtime);
        obj.set_field(types::TERMIOS_CC_FIELD, Value::Array(None)).unwrap();
        obj.set_field("c_lflag", Value::Long(0o12)).unwrap();

        let mut native = <Termios as NativeStruct>::zeroed();
        native.c_cc[1] = 7;
        crate::marshal::load_into(&obj, &mut native).unwrap();
        assert_eq!(native.c_cc[1], 7);
        assert_eq!(native.c_lflag, 0o12);
    }

    const TERMIOS_SCALARS: [&str; 6] =
        ["c_iflag", "c_oflag", "c_cflag", "c_lflag", "c_ispeed", "c_ospeed"];

    /// Fill every scalar field and `c_cc`, marshal to native and back into
    /// a fresh object, and return both objects.
    fn termios_round_trip(
        runtime: &Runtime,
        values: [u32; 6],
        cc: &[u8],
    ) -> (crate::managed::ObjectRef, crate::managed::ObjectRef) {
        let obj = termios_object(runtime);
        for (name, value) in TERMIOS_SCALARS.iter().zip(values) {
            obj.set_field(name, Value::Long(i64::from(value))).unwrap();
        }
        obj.set_field(types::TERMIOS_CC_FIELD, Value::Array(Some(Array::new(cc.to_vec()))))
            .unwrap();

        let native: Termios = read_into_native(&obj).unwrap();
        assert_eq!(&native.c_cc[..], &cc[..NCCS]);

        let copy = termios_object(runtime);
        write_from_native(&native, &copy).unwrap();
        (obj, copy)
    }

    fn cc_of(obj: &crate::managed::ObjectRef) -> Vec<u8> {
        let Some(Value::Array(Some(array))) = obj.field(types::TERMIOS_CC_FIELD) else {
            panic!("c_cc missing");
        };
        array.to_vec::<u8>().unwrap()
    }

    #[test]
    fn test_termios_boundary_masks_round_trip() {
        let runtime = Runtime::with_standard_classes();
        for (fill, cc_byte) in [(0u32, 0u8), (u32::MAX, 0xFF)] {
            let (obj, copy) = termios_round_trip(&runtime, [fill; 6], &[cc_byte; NCCS]);
            for name in TERMIOS_SCALARS {
                assert_eq!(copy.field(name), obj.field(name), "{} at {:#x}", name, fill);
                assert_eq!(copy.field(name), Some(Value::Long(i64::from(fill))));
            }
            assert_eq!(&cc_of(&copy)[..NCCS], &[cc_byte; NCCS][..]);
        }
    }

    proptest! {
        #[test]
        fn test_termios_fields_survive_round_trip(
            iflag in any::<u32>(),
            oflag in any::<u32>(),
            cflag in any::<u32>(),
            lflag in any::<u32>(),
            ispeed in 0u32..=4_000_000,
            ospeed in 0u32..=4_000_000,
            cc in proptest::collection::vec(any::<u8>(), NCCS),
        ) {
            let runtime = Runtime::with_standard_classes();
            let (obj, copy) =
                termios_round_trip(&runtime, [iflag, oflag, cflag, lflag, ispeed, ospeed], &cc);
            for name in TERMIOS_SCALARS {
                prop_assert_eq!(copy.field(name), obj.field(name));
            }
            prop_assert_eq!(&cc_of(&copy)[..NCCS], &cc[..]);
        }
    }
}
