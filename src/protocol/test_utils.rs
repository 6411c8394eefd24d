//! Shared property-test helpers for unversioned wire primitives.

macro_rules! test_roundtrip {
    ($t:ty, $name:ident) => {
        #[allow(unused_imports)]
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig{fork: false, ..Default::default()})]
            #[test]
            fn $name(orig: $t) {
                #[allow(unused_imports)]
                use std::io::Cursor;

                let mut buf = Vec::<u8>::new();
                orig.write(&mut buf).unwrap();

                let mut cursor = Cursor::new(buf);
                let restored = <$t>::read(&mut cursor).unwrap();

                assert_eq!(orig, restored);
            }
        }
    };
}

pub(crate) use test_roundtrip;
