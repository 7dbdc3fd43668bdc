/// Builds a [`Matrix`](crate::Matrix) from row literals separated by `;`.
///
/// ```
/// use matrix::{Matrix, matrix};
///
/// let m = matrix![
///     1.0, 2.0;
///     3.0, 4.0
/// ];
/// assert_eq!(m.get(1, 0), 3.0);
/// ```
#[macro_export]
macro_rules! matrix {
    ( $( $($val:expr),+ );* $(;)? ) => {
        {
            let mut data = Vec::<f64>::new();
            let mut rows = 0;
            let mut cols = 0;
            $(
                let row_data: Vec<f64> = vec![$($val),+];
                let row_len = row_data.len();
                data.extend(row_data);
                rows += 1;
                if cols == 0 {
                    cols = row_len;
                } else if cols != row_len {
                    panic!("Inconsistent number of elements in the matrix rows");
                }
            )*

            $crate::Matrix::new(rows, cols, data)
        }
    };
}
