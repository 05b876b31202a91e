use super::*;

#[test]
fn mul_div255_rounds() {
    assert_eq!(mul_div255_u16(255, 255), 255);
    assert_eq!(mul_div255_u16(128, 255), 128);
    assert_eq!(mul_div255_u8(0, 200), 0);
}

#[test]
fn over_premul_edges() {
    let dst = [10, 20, 30, 255];
    assert_eq!(over_premul(dst, [0, 0, 0, 0]), dst);
    assert_eq!(over_premul(dst, [1, 2, 3, 255]), [1, 2, 3, 255]);
    let half = over_premul([200, 200, 200, 255], [50, 0, 0, 128]);
    assert_eq!(half[3], 255);
    assert!(half[0] > 50 && half[0] < 200);
}

#[test]
fn premultiply_scales_color() {
    let mut px = vec![255, 128, 0, 128];
    premultiply_in_place(&mut px);
    assert_eq!(px, vec![128, 64, 0, 128]);
}

#[test]
fn luma_of_white_and_black() {
    assert_eq!(luma(&[255, 255, 255, 255]), 255);
    assert_eq!(luma(&[0, 0, 0, 255]), 0);
}
