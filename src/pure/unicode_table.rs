// Generated from Unicode 15.1.0 character data; do not edit by hand.
//
// Inclusive ranges of code points that are safe to display, sorted and
// non-overlapping.

pub(super) static DISPLAY_SAFE_RANGES: &[(u32, u32)] = &[
    (0x0020, 0x007E),
    (0x00A1, 0x00A5),
    (0x00A7, 0x00A7),
    (0x00AA, 0x00AC),
    (0x00B1, 0x00B3),
    (0x00B5, 0x00B7),
    (0x00B9, 0x02C1),
    (0x02C6, 0x02D1),
    (0x02E0, 0x02E4),
    (0x02EC, 0x02EC),
    (0x02EE, 0x02EE),
    (0x0370, 0x0374),
    (0x0376, 0x0377),
    (0x037A, 0x037F),
    (0x0386, 0x038A),
    (0x038C, 0x038C),
    (0x038E, 0x03A1),
    (0x03A3, 0x03E1),
    (0x03F0, 0x0481),
    (0x048A, 0x052F),
    (0x1100, 0x11FF),
    (0x1C80, 0x1C88),
    (0x1D00, 0x1DBF),
    (0x1E00, 0x1F15),
    (0x1F18, 0x1F1D),
    (0x1F20, 0x1F45),
    (0x1F48, 0x1F4D),
    (0x1F50, 0x1F57),
    (0x1F59, 0x1F59),
    (0x1F5B, 0x1F5B),
    (0x1F5D, 0x1F5D),
    (0x1F5F, 0x1F7D),
    (0x1F80, 0x1FB4),
    (0x1FB6, 0x1FBC),
    (0x1FBE, 0x1FBE),
    (0x1FC2, 0x1FC4),
    (0x1FC6, 0x1FCC),
    (0x1FD0, 0x1FD3),
    (0x1FD6, 0x1FDB),
    (0x1FE0, 0x1FEC),
    (0x1FF2, 0x1FF4),
    (0x1FF6, 0x1FFC),
    (0x2010, 0x2027),
    (0x2030, 0x205E),
    (0x2070, 0x2071),
    (0x2074, 0x208E),
    (0x2090, 0x209C),
    (0x20A0, 0x20C0),
    (0x2102, 0x2102),
    (0x2107, 0x2107),
    (0x210A, 0x2113),
    (0x2115, 0x2115),
    (0x2118, 0x211D),
    (0x2124, 0x2124),
    (0x2126, 0x2126),
    (0x2128, 0x2128),
    (0x212A, 0x212D),
    (0x212F, 0x2139),
    (0x213C, 0x2149),
    (0x214B, 0x214B),
    (0x214E, 0x214E),
    (0x2150, 0x2189),
    (0x2190, 0x2194),
    (0x219A, 0x219B),
    (0x21A0, 0x21A0),
    (0x21A3, 0x21A3),
    (0x21A6, 0x21A6),
    (0x21AE, 0x21AE),
    (0x21CE, 0x21CF),
    (0x21D2, 0x21D2),
    (0x21D4, 0x21D4),
    (0x21F4, 0x22FF),
    (0x2308, 0x230B),
    (0x2320, 0x2321),
    (0x2329, 0x232A),
    (0x237C, 0x237C),
    (0x239B, 0x23B3),
    (0x23DC, 0x23E1),
    (0x2460, 0x249B),
    (0x24EA, 0x24FF),
    (0x25B7, 0x25B7),
    (0x25C1, 0x25C1),
    (0x25F8, 0x25FF),
    (0x266F, 0x266F),
    (0x2768, 0x2793),
    (0x27C0, 0x27FF),
    (0x2900, 0x2AFF),
    (0x2B30, 0x2B44),
    (0x2B47, 0x2B4C),
    (0x2C60, 0x2C7F),
    (0x2E00, 0x2E4F),
    (0x2E52, 0x2E5D),
    (0x3001, 0x3003),
    (0x3005, 0x3011),
    (0x3014, 0x301F),
    (0x3021, 0x3029),
    (0x3030, 0x3035),
    (0x3038, 0x303D),
    (0x3041, 0x3096),
    (0x309D, 0x30FF),
    (0x3105, 0x312F),
    (0x3131, 0x318E),
    (0x3192, 0x3195),
    (0x31A0, 0x31BF),
    (0x31F0, 0x31FF),
    (0x3220, 0x3229),
    (0x3248, 0x324F),
    (0x3251, 0x325F),
    (0x3280, 0x3289),
    (0x32B1, 0x32BF),
    (0x3400, 0x4DBF),
    (0x4E00, 0x9FFF),
    (0xA640, 0xA66E),
    (0xA673, 0xA673),
    (0xA67E, 0xA69D),
    (0xA717, 0xA71F),
    (0xA722, 0xA788),
    (0xA78B, 0xA7CA),
    (0xA7D0, 0xA7D1),
    (0xA7D3, 0xA7D3),
    (0xA7D5, 0xA7D9),
    (0xA7F2, 0xA7FF),
    (0xA830, 0xA835),
    (0xA838, 0xA838),
    (0xA960, 0xA97C),
    (0xAB30, 0xAB5A),
    (0xAB5C, 0xAB69),
    (0xAC00, 0xD7A3),
    (0xD7B0, 0xD7C6),
    (0xD7CB, 0xD7FB),
    (0xF900, 0xFA6D),
    (0xFA70, 0xFAD9),
    (0xFB00, 0xFB06),
    (0xFE10, 0xFE19),
    (0xFE30, 0xFE52),
    (0xFE54, 0xFE66),
    (0xFE68, 0xFE6B),
    (0xFF01, 0xFF3D),
    (0xFF3F, 0xFF3F),
    (0xFF41, 0xFFBE),
    (0xFFC2, 0xFFC7),
    (0xFFCA, 0xFFCF),
    (0xFFD2, 0xFFD7),
    (0xFFDA, 0xFFDC),
    (0xFFE0, 0xFFE2),
    (0xFFE5, 0xFFE6),
    (0xFFE9, 0xFFEC),
    (0x10140, 0x10178),
    (0x1018A, 0x1018B),
    (0x10780, 0x10785),
    (0x10787, 0x107B0),
    (0x107B2, 0x107BA),
    (0x1AFF0, 0x1AFF3),
    (0x1AFF5, 0x1AFFB),
    (0x1AFFD, 0x1AFFE),
    (0x1B000, 0x1B122),
    (0x1B150, 0x1B152),
    (0x1B164, 0x1B167),
    (0x1D400, 0x1D454),
    (0x1D456, 0x1D49C),
    (0x1D49E, 0x1D49F),
    (0x1D4A2, 0x1D4A2),
    (0x1D4A5, 0x1D4A6),
    (0x1D4A9, 0x1D4AC),
    (0x1D4AE, 0x1D4B9),
    (0x1D4BB, 0x1D4BB),
    (0x1D4BD, 0x1D4C3),
    (0x1D4C5, 0x1D505),
    (0x1D507, 0x1D50A),
    (0x1D50D, 0x1D514),
    (0x1D516, 0x1D51C),
    (0x1D51E, 0x1D539),
    (0x1D53B, 0x1D53E),
    (0x1D540, 0x1D544),
    (0x1D546, 0x1D546),
    (0x1D54A, 0x1D550),
    (0x1D552, 0x1D6A5),
    (0x1D6A8, 0x1D7CB),
    (0x1D7CE, 0x1D7FF),
    (0x1DF00, 0x1DF1E),
    (0x1F100, 0x1F10C),
    (0x20000, 0x2A6DF),
    (0x2A700, 0x2B738),
    (0x2B740, 0x2B81D),
    (0x2B820, 0x2CEA1),
    (0x2CEB0, 0x2EBE0),
    (0x2EBF0, 0x2EE5D),
    (0x2F800, 0x2FA1D),
    (0x30000, 0x3134A),
    (0x31350, 0x323AF),
];
